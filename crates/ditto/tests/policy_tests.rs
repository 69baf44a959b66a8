//! Classification-rule tests for the copy policy.
//!
//! One test per rule family: the immutable seed set, the user marker,
//! primitive-kinded types, arrays, value composites, reference composites,
//! and generic carriers. Policy decisions are observed both directly via
//! `DeepCopier::classify` and through copy behavior where aliasing is the
//! visible consequence.

use ditto::{
    BuiltinType, CopyOptions, DeepCopier, Heap, HeapData, Policy, StructDef, TypeKind, TypeRegistry, Value,
};

// =============================================================================
// 1. Seed set
// =============================================================================

/// Primitives, strings, bytes, and the well-known value types are
/// immutable out of the box.
#[test]
fn seed_set_is_immutable() {
    let engine = DeepCopier::new(TypeRegistry::new());
    for builtin in [
        BuiltinType::Null,
        BuiltinType::Bool,
        BuiltinType::Int,
        BuiltinType::Float,
        BuiltinType::Str,
        BuiltinType::Bytes,
        BuiltinType::Decimal,
        BuiltinType::Timestamp,
        BuiltinType::Span,
        BuiltinType::OffsetTimestamp,
        BuiltinType::Uuid,
        BuiltinType::Version,
        BuiltinType::Uri,
    ] {
        assert_eq!(
            engine.classify(builtin.into()),
            Policy::Immutable,
            "{builtin} must be in the immutable seed set"
        );
    }
}

/// The seed set is extensible at engine construction.
#[test]
fn seed_set_extension_aliases_instances() {
    let mut registry = TypeRegistry::new();
    let config = registry.register(
        "Config",
        TypeKind::RefStruct,
        StructDef::new().field("threshold", BuiltinType::Int),
    );
    let holder = registry.register("Holder", TypeKind::RefStruct, StructDef::new().field("config", config));
    let engine = DeepCopier::with_options(
        registry,
        CopyOptions {
            immutable_types: vec![config],
            ..CopyOptions::default()
        },
    );
    assert_eq!(engine.classify(config), Policy::Immutable);

    let mut heap = Heap::new();
    let config_value = heap
        .alloc_object(engine.registry(), config, vec![Value::Int(10)])
        .unwrap();
    let holder_value = heap
        .alloc_object(engine.registry(), holder, vec![config_value])
        .unwrap();
    let copy = engine.copy(&mut heap, holder_value).unwrap();
    let copied_config = match heap.get(copy.heap_id().unwrap()) {
        HeapData::Object(object) => object.fields()[0],
        other => panic!("expected an object, got {other:?}"),
    };
    assert_eq!(copied_config, config_value, "seeded types must be aliased, not copied");
}

// =============================================================================
// 2. Marker and primitive kinds
// =============================================================================

/// The user-supplied immutable marker wins over field analysis.
#[test]
fn marker_forces_immutable() {
    let mut registry = TypeRegistry::new();
    let marked = registry.register(
        "Snapshot",
        TypeKind::RefStruct,
        StructDef::new().field("data", BuiltinType::Int).immutable(),
    );
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(marked), Policy::Immutable);
}

/// Enums, pointer-likes, and function references are refused as copy
/// targets and treated as values.
#[test]
fn primitive_kinded_types_are_immutable() {
    let mut registry = TypeRegistry::new();
    let color = registry.declare("Color", TypeKind::Enum);
    let handle = registry.declare("NativeHandle", TypeKind::Pointer);
    let callback = registry.declare("Callback", TypeKind::FunctionRef);
    let engine = DeepCopier::new(registry);
    for (id, label) in [(color, "enum"), (handle, "pointer"), (callback, "function ref")] {
        assert_eq!(engine.classify(id), Policy::Immutable, "{label} types are values");
    }
}

// =============================================================================
// 3. Arrays
// =============================================================================

/// Arrays are mutable unconditionally, whatever their element policy.
#[test]
fn arrays_are_always_mutable() {
    let mut registry = TypeRegistry::new();
    let int_array = registry.array_of(BuiltinType::Int, 1);
    let str_matrix = registry.array_of(BuiltinType::Str, 2);
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(int_array), Policy::Mutable);
    assert_eq!(engine.classify(str_matrix), Policy::Mutable);
}

// =============================================================================
// 4. Value composites
// =============================================================================

/// A value struct whose fields are all immutable is shallow-copyable.
#[test]
fn all_immutable_value_struct_is_shallow() {
    let mut registry = TypeRegistry::new();
    let point = registry.register(
        "Point",
        TypeKind::ValueStruct,
        StructDef::new().field("x", BuiltinType::Int).field("y", BuiltinType::Int),
    );
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(point), Policy::ShallowCopyable);
}

/// A value struct holding a mutable reference field must be deep-copied.
#[test]
fn value_struct_with_mutable_field_is_mutable() {
    let mut registry = TypeRegistry::new();
    let node = registry.declare("Node", TypeKind::RefStruct);
    registry.define(node, StructDef::new().field("next", node));
    let slot = registry.register("Slot", TypeKind::ValueStruct, StructDef::new().field("node", node));
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(slot), Policy::Mutable);
}

/// A self-recursive value type is forced to mutable; classification
/// terminates instead of recursing forever.
#[test]
fn self_recursive_value_type_is_mutable() {
    let mut registry = TypeRegistry::new();
    let nested = registry.declare("Nested", TypeKind::ValueStruct);
    registry.define(nested, StructDef::new().field("inner", nested));
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(nested), Policy::Mutable);
}

/// Opaque-kind fields are excluded before any reasoning: a value struct
/// whose only fields are pointer-like is vacuously shallow-copyable.
#[test]
fn opaque_only_value_struct_is_shallow() {
    let mut registry = TypeRegistry::new();
    let handle = registry.declare("Handle", TypeKind::Pointer);
    let wrapper = registry.register(
        "HandleWrapper",
        TypeKind::ValueStruct,
        StructDef::new().field("raw", handle).field("callback", BuiltinType::FunctionRef),
    );
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(wrapper), Policy::ShallowCopyable);
}

// =============================================================================
// 5. Reference composites
// =============================================================================

/// A reference type is immutable only when every copyable field is both
/// read-only and of immutable type.
#[test]
fn read_only_immutable_fields_make_ref_type_immutable() {
    let mut registry = TypeRegistry::new();
    let frozen = registry.register(
        "Frozen",
        TypeKind::RefStruct,
        StructDef::new()
            .read_only_field("label", BuiltinType::Str)
            .read_only_field("count", BuiltinType::Int),
    );
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(frozen), Policy::Immutable);
}

/// A writable field of immutable type breaks the proof.
#[test]
fn writable_field_makes_ref_type_mutable() {
    let mut registry = TypeRegistry::new();
    let thawed = registry.register(
        "Thawed",
        TypeKind::RefStruct,
        StructDef::new().field("label", BuiltinType::Str),
    );
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(thawed), Policy::Mutable);
}

/// A read-only field of mutable type breaks the proof too.
#[test]
fn read_only_mutable_field_makes_ref_type_mutable() {
    let mut registry = TypeRegistry::new();
    let node = registry.declare("Node", TypeKind::RefStruct);
    registry.define(node, StructDef::new().field("next", node));
    let pinned = registry.register("Pinned", TypeKind::RefStruct, StructDef::new().read_only_field("node", node));
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(pinned), Policy::Mutable);
}

// =============================================================================
// 6. Generic carriers
// =============================================================================

/// A seeded carrier is immutable only when all type arguments are
/// immutable; otherwise the instantiation is classified on its own.
#[test]
fn pair_inherits_seed_entry_only_for_immutable_args() {
    let mut registry = TypeRegistry::new();
    let node = registry.declare("Node", TypeKind::RefStruct);
    registry.define(node, StructDef::new().field("next", node));
    let pair_of_immutables = registry.pair_of(BuiltinType::Int, BuiltinType::Str);
    let pair_with_mutable = registry.pair_of(BuiltinType::Int, node);
    let engine = DeepCopier::new(registry);

    assert_eq!(engine.classify(pair_of_immutables), Policy::Immutable);
    assert_eq!(
        engine.classify(pair_with_mutable),
        Policy::Mutable,
        "a carrier holding a mutable argument must not be aliased"
    );
}

/// The sealing wrapper is immutable regardless of its payload; that is its
/// entire purpose.
#[test]
fn sealed_wrapper_is_unconditionally_immutable() {
    let mut registry = TypeRegistry::new();
    let int_array = registry.array_of(BuiltinType::Int, 1);
    let sealed = registry.sealed_of(int_array);
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(sealed), Policy::Immutable);

    // The payload of a sealed value is aliased unchanged.
    let mut heap = Heap::new();
    let payload = heap
        .alloc_array(engine.registry(), int_array, [2], vec![Value::Int(1), Value::Int(2)])
        .unwrap();
    let sealed_value = heap.alloc_object(engine.registry(), sealed, vec![payload]).unwrap();
    let copy = engine.copy(&mut heap, sealed_value).unwrap();
    assert_eq!(copy, sealed_value, "sealed values are aliased wholesale");
}

/// A reference type with no fields at all has no mutable state to protect
/// and classifies immutable through the read-only rule.
#[test]
fn empty_ref_struct_is_immutable() {
    let mut registry = TypeRegistry::new();
    let unit = registry.register("Unit", TypeKind::RefStruct, StructDef::new());
    let engine = DeepCopier::new(registry);
    assert_eq!(engine.classify(unit), Policy::Immutable);
}

// =============================================================================
// 7. Shallow-copy semantics in object fields
// =============================================================================

/// A field of shallow-copyable declared type is duplicated by value bits:
/// the copy gets its own instance, but nothing below it is recursed into.
#[test]
fn shallow_field_is_duplicated_not_aliased() {
    let mut registry = TypeRegistry::new();
    let point = registry.register(
        "Point",
        TypeKind::ValueStruct,
        StructDef::new().field("x", BuiltinType::Int).field("y", BuiltinType::Int),
    );
    let shape = registry.register("Shape", TypeKind::RefStruct, StructDef::new().field("origin", point));
    let engine = DeepCopier::new(registry);
    let mut heap = Heap::new();

    let origin = heap
        .alloc_object(engine.registry(), point, vec![Value::Int(3), Value::Int(4)])
        .unwrap();
    let shape_value = heap.alloc_object(engine.registry(), shape, vec![origin]).unwrap();

    let copy = engine.copy(&mut heap, shape_value).unwrap();
    let copied_origin = match heap.get(copy.heap_id().unwrap()) {
        HeapData::Object(object) => object.fields()[0],
        other => panic!("expected an object, got {other:?}"),
    };
    assert_ne!(copied_origin, origin, "value-struct payloads must not share storage");
    assert!(copied_origin.structurally_eq(&origin, &heap));
}
