//! The type registry: pre-registered builtin types plus caller registrations.
//!
//! Builtin types occupy fixed low ids via [`BuiltinType`], the same layout
//! trick interners use for static strings: well-known ids are known at
//! compile time and need no lookup. User types are declared (reserving an
//! id, so self-referential fields can name it) and then defined, at which
//! point the field layout is computed once: the declaration chain is walked
//! most-derived to root, fields are merged, sorted by ordinal name
//! comparison, and opaque-kind fields are excluded from the copyable list.
//!
//! The registry is built up front and then shared immutably by the engine;
//! registration is `&mut self`, everything the copy path needs is `&self`.

use ahash::AHashMap;
use strum::IntoStaticStr;

use crate::{
    types::descriptor::{CtorFn, FieldDescriptor, StructDef, TypeDescriptor, TypeId, TypeKind},
    value::Value,
};

/// Builtin types pre-registered at fixed ids.
///
/// The discriminant is the raw `TypeId` index. `Sealed` and `Pair` are the
/// generic templates; their instantiations are interned separately via
/// [`TypeRegistry::sealed_of`] and [`TypeRegistry::pair_of`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, IntoStaticStr, strum::FromRepr)]
pub enum BuiltinType {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    Decimal,
    Timestamp,
    Span,
    OffsetTimestamp,
    Uuid,
    Version,
    Uri,
    Pointer,
    FunctionRef,
    Meta,
    Sealed,
    Pair,
}

/// Number of builtin type ids. User registrations start here.
const BUILTIN_COUNT: u32 = 18;

impl From<BuiltinType> for TypeId {
    fn from(builtin: BuiltinType) -> Self {
        Self(builtin as u32)
    }
}

impl BuiltinType {
    fn kind(self) -> TypeKind {
        match self {
            Self::Null | Self::Bool | Self::Int | Self::Float => TypeKind::Primitive,
            Self::Str => TypeKind::Str,
            Self::Bytes => TypeKind::Bytes,
            Self::Decimal
            | Self::Timestamp
            | Self::Span
            | Self::OffsetTimestamp
            | Self::Uuid
            | Self::Version
            | Self::Uri => TypeKind::WellKnown,
            Self::Pointer => TypeKind::Pointer,
            Self::FunctionRef => TypeKind::FunctionRef,
            Self::Meta => TypeKind::Meta,
            // Templates are value-struct carriers; instantiations get real
            // field layouts, the template entries themselves stay empty.
            Self::Sealed | Self::Pair => TypeKind::ValueStruct,
        }
    }

    fn is_seed(self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Primitive | TypeKind::Str | TypeKind::Bytes | TypeKind::WellKnown
        )
    }
}

/// Registry of every type the engine can encounter.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: AHashMap<String, TypeId>,
    /// Interned array types keyed by (element, rank).
    arrays: AHashMap<(TypeId, usize), TypeId>,
    /// Interned generic instantiations keyed by (template, args).
    instantiations: AHashMap<(TypeId, Vec<TypeId>), TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry with all builtin types pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::with_capacity(BUILTIN_COUNT as usize),
            by_name: AHashMap::new(),
            arrays: AHashMap::new(),
            instantiations: AHashMap::new(),
        };
        for raw in 0..BUILTIN_COUNT {
            let builtin = BuiltinType::from_repr(raw).expect("builtin discriminants are dense");
            let name: &'static str = builtin.into();
            let id = TypeId(raw);
            registry.by_name.insert(name.to_owned(), id);
            registry.types.push(TypeDescriptor {
                name: name.to_owned(),
                kind: builtin.kind(),
                base: None,
                declared_fields: Vec::new(),
                layout: Vec::new(),
                copyable: Vec::new(),
                ctor: None,
                // The Pair template sits in the immutable seed set; its
                // instantiations inherit that entry only when every type
                // argument is itself immutable.
                immutable_marker: matches!(builtin, BuiltinType::Pair),
                template: None,
                type_args: Vec::new(),
                defined: true,
            });
        }
        registry
    }

    /// Declares a type, reserving its id without defining fields.
    ///
    /// Composite kinds must be completed with [`Self::define`] before the
    /// engine sees instances of them; opaque kinds (`Enum`, `Pointer`,
    /// `FunctionRef`, `ByRef`) are complete as declared.
    ///
    /// # Panics
    /// Panics if the name is already registered, or if `kind` is a builtin
    /// kind that cannot be declared directly (arrays are interned via
    /// [`Self::array_of`], scalars and well-knowns are pre-registered).
    pub fn declare(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeId {
        let name = name.into();
        assert!(
            matches!(
                kind,
                TypeKind::ValueStruct | TypeKind::RefStruct | TypeKind::Enum | TypeKind::Pointer
                    | TypeKind::FunctionRef
                    | TypeKind::ByRef
            ),
            "cannot declare a type of kind {kind}; builtin kinds are pre-registered"
        );
        assert!(
            !self.by_name.contains_key(&name),
            "type name '{name}' is already registered"
        );
        let defined = !matches!(kind, TypeKind::ValueStruct | TypeKind::RefStruct);
        let id = TypeId(u32::try_from(self.types.len()).expect("type count fits in u32"));
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeDescriptor {
            name,
            kind,
            base: None,
            declared_fields: Vec::new(),
            layout: Vec::new(),
            copyable: Vec::new(),
            ctor: None,
            immutable_marker: false,
            template: None,
            type_args: Vec::new(),
            defined,
        });
        id
    }

    /// Defines a previously declared composite type and computes its layout.
    ///
    /// # Panics
    /// Panics if the id was not declared as a composite, was already
    /// defined, names an undefined base, sets a base on a value struct, or
    /// produces duplicate field names along the declaration chain.
    pub fn define(&mut self, id: TypeId, def: StructDef) {
        {
            let descriptor = self.descriptor(id);
            assert!(
                matches!(descriptor.kind, TypeKind::ValueStruct | TypeKind::RefStruct),
                "define() is only valid for composite types, '{name}' is {kind}",
                name = descriptor.name,
                kind = descriptor.kind,
            );
            assert!(!descriptor.defined, "type '{name}' is already defined", name = descriptor.name);
            if def.base.is_some() {
                assert!(
                    matches!(descriptor.kind, TypeKind::RefStruct),
                    "value struct '{name}' cannot have a base type",
                    name = descriptor.name,
                );
            }
        }
        if let Some(base) = def.base {
            let base_descriptor = self.descriptor(base);
            assert!(
                base_descriptor.defined && matches!(base_descriptor.kind, TypeKind::RefStruct),
                "base of '{name}' must be a defined reference struct",
                name = self.descriptor(id).name,
            );
        }

        let layout = self.gather_layout(def.base, &def.fields, &self.descriptor(id).name.clone());
        let copyable = self.copyable_indices(&layout);

        let descriptor = &mut self.types[id.index()];
        descriptor.base = def.base;
        descriptor.declared_fields = def.fields;
        descriptor.layout = layout;
        descriptor.copyable = copyable;
        descriptor.ctor = def.ctor;
        descriptor.immutable_marker = def.immutable;
        descriptor.template = def.template;
        descriptor.type_args = def.type_args;
        descriptor.defined = true;
    }

    /// Declares and defines a composite type in one step.
    pub fn register(&mut self, name: impl Into<String>, kind: TypeKind, def: StructDef) -> TypeId {
        let id = self.declare(name, kind);
        self.define(id, def);
        id
    }

    /// Applies the immutable marker to an already-registered type.
    pub fn mark_immutable(&mut self, id: TypeId) {
        self.types[id.index()].immutable_marker = true;
    }

    /// Returns the interned array type for (element, rank), registering it
    /// on first use.
    ///
    /// # Panics
    /// Panics if `rank` is zero.
    pub fn array_of(&mut self, elem: impl Into<TypeId>, rank: usize) -> TypeId {
        let elem = elem.into();
        assert!(rank >= 1, "array rank must be at least 1");
        if let Some(&id) = self.arrays.get(&(elem, rank)) {
            return id;
        }
        let name = format!("{elem_name}[{commas}]", elem_name = self.name(elem), commas = ",".repeat(rank - 1));
        let id = TypeId(u32::try_from(self.types.len()).expect("type count fits in u32"));
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeDescriptor {
            name,
            kind: TypeKind::Array { elem, rank },
            base: None,
            declared_fields: Vec::new(),
            layout: Vec::new(),
            copyable: Vec::new(),
            ctor: None,
            immutable_marker: false,
            template: None,
            type_args: Vec::new(),
            defined: true,
        });
        self.arrays.insert((elem, rank), id);
        id
    }

    /// Returns the interned `Sealed<inner>` instantiation.
    ///
    /// `Sealed` is the aliasing wrapper: a single-payload value struct that
    /// bears the immutable marker, so the engine never descends into it and
    /// the payload is aliased unchanged.
    pub fn sealed_of(&mut self, inner: impl Into<TypeId>) -> TypeId {
        let inner = inner.into();
        let def = StructDef::new().field("value", inner).immutable();
        self.instantiate(BuiltinType::Sealed.into(), vec![inner], def)
    }

    /// Returns the interned `Pair<key, value>` instantiation, the tuple-like
    /// carrier whose template sits in the immutable seed set.
    pub fn pair_of(&mut self, key: impl Into<TypeId>, value: impl Into<TypeId>) -> TypeId {
        let key = key.into();
        let value = value.into();
        let def = StructDef::new().field("key", key).field("value", value);
        self.instantiate(BuiltinType::Pair.into(), vec![key, value], def)
    }

    fn instantiate(&mut self, template: TypeId, args: Vec<TypeId>, mut def: StructDef) -> TypeId {
        if let Some(&id) = self.instantiations.get(&(template, args.clone())) {
            return id;
        }
        let arg_names: Vec<&str> = args.iter().map(|&a| self.name(a)).collect();
        let name = format!(
            "{template_name}<{args}>",
            template_name = self.name(template),
            args = arg_names.join(", ")
        );
        def.template = Some(template);
        def.type_args = args.clone();
        let id = self.declare(name, TypeKind::ValueStruct);
        self.define(id, def);
        self.instantiations.insert((template, args), id);
        id
    }

    /// Descriptor for a type id.
    ///
    /// # Panics
    /// Panics if the id was not issued by this registry.
    #[must_use]
    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    /// Registered name of a type id.
    #[must_use]
    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.index()].name
    }

    /// Structural kind of a type id.
    #[must_use]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.index()].kind
    }

    /// Looks up a type id by registered name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Number of registered types, builtins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` when only builtin types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.len() == BUILTIN_COUNT as usize
    }

    /// Whether a type belongs to the fixed immutable seed set (primitives,
    /// string, bytes, and the well-known value types).
    #[must_use]
    pub fn is_seed_immutable(&self, id: TypeId) -> bool {
        BuiltinType::from_repr(id.0).is_some_and(BuiltinType::is_seed)
    }

    /// Registered no-arg constructor for a type, if any.
    #[must_use]
    pub(crate) fn ctor(&self, id: TypeId) -> Option<&CtorFn> {
        self.types[id.index()].ctor.as_ref()
    }

    /// Element type and rank of an array type.
    ///
    /// Returns `None` when the id is not an array type.
    #[must_use]
    pub fn array_elem_rank(&self, id: TypeId) -> Option<(TypeId, usize)> {
        match self.types[id.index()].kind {
            TypeKind::Array { elem, rank } => Some((elem, rank)),
            _ => None,
        }
    }

    /// The uninitialized-instance factory: a zeroed value for a declared
    /// field type. Numerics zero, booleans false, everything reference-like
    /// null.
    #[must_use]
    pub fn uninitialized_value(&self, declared: TypeId) -> Value {
        match &self.types[declared.index()].kind {
            TypeKind::Primitive => match BuiltinType::from_repr(declared.0) {
                Some(BuiltinType::Bool) => Value::Bool(false),
                Some(BuiltinType::Int) => Value::Int(0),
                Some(BuiltinType::Float) => Value::Float(0.0),
                _ => Value::Null,
            },
            TypeKind::Enum => Value::Enum(declared, 0),
            TypeKind::Pointer => Value::Pointer(0),
            TypeKind::FunctionRef => Value::FunctionRef(0),
            _ => Value::Null,
        }
    }

    /// Zeroed field slots for a composite type, in layout order.
    #[must_use]
    pub fn uninitialized_fields(&self, id: TypeId) -> Vec<Value> {
        self.types[id.index()]
            .layout
            .iter()
            .map(|field| self.uninitialized_value(field.declared))
            .collect()
    }

    /// Gathers the field layout for a type: own fields plus the declaration
    /// chain walked most-derived to root, then sorted by ordinal name.
    fn gather_layout(&self, base: Option<TypeId>, own: &[FieldDescriptor], type_name: &str) -> Vec<FieldDescriptor> {
        let mut layout: Vec<FieldDescriptor> = own.to_vec();
        let mut next = base;
        while let Some(ancestor) = next {
            let descriptor = self.descriptor(ancestor);
            layout.extend(descriptor.declared_fields.iter().cloned());
            next = descriptor.base;
        }
        layout.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        for pair in layout.windows(2) {
            assert!(
                pair[0].name != pair[1].name,
                "duplicate field name '{field}' in declaration chain of '{type_name}'",
                field = pair[0].name,
            );
        }
        layout
    }

    /// Indices of layout fields that survive the opaque-kind exclusion.
    fn copyable_indices(&self, layout: &[FieldDescriptor]) -> Vec<usize> {
        layout
            .iter()
            .enumerate()
            .filter(|(_, field)| !self.kind(field.declared).is_opaque())
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_stable() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.name(BuiltinType::Int.into()), "Int");
        assert_eq!(registry.name(BuiltinType::Uri.into()), "Uri");
        assert_eq!(registry.len(), BUILTIN_COUNT as usize);
    }

    #[test]
    fn layout_is_sorted_by_ordinal_name() {
        let mut registry = TypeRegistry::new();
        let id = registry.register(
            "Widget",
            TypeKind::RefStruct,
            StructDef::new()
                .field("zeta", BuiltinType::Int)
                .field("alpha", BuiltinType::Int)
                .field("Beta", BuiltinType::Int),
        );
        let names: Vec<&str> = registry.descriptor(id).layout().iter().map(|f| f.name.as_str()).collect();
        // Ordinal comparison: uppercase sorts before lowercase.
        assert_eq!(names, ["Beta", "alpha", "zeta"]);
    }

    #[test]
    fn layout_includes_base_chain_fields() {
        let mut registry = TypeRegistry::new();
        let base = registry.register("Animal", TypeKind::RefStruct, StructDef::new().field("name", BuiltinType::Str));
        let derived = registry.register(
            "Dog",
            TypeKind::RefStruct,
            StructDef::new().base(base).field("barks", BuiltinType::Bool),
        );
        let names: Vec<&str> = registry
            .descriptor(derived)
            .layout()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["barks", "name"]);
    }

    #[test]
    fn opaque_fields_are_excluded_from_copyable() {
        let mut registry = TypeRegistry::new();
        let handle = registry.declare("NativeHandle", TypeKind::Pointer);
        let id = registry.register(
            "Resource",
            TypeKind::RefStruct,
            StructDef::new()
                .field("handle", handle)
                .field("callback", BuiltinType::FunctionRef)
                .field("label", BuiltinType::Str),
        );
        let descriptor = registry.descriptor(id);
        assert_eq!(descriptor.layout().len(), 3);
        let copyable_names: Vec<&str> = descriptor
            .copyable_slots()
            .iter()
            .map(|&slot| descriptor.layout()[slot].name.as_str())
            .collect();
        assert_eq!(copyable_names, ["label"]);
    }

    #[test]
    fn array_types_are_interned() {
        let mut registry = TypeRegistry::new();
        let a = registry.array_of(BuiltinType::Int, 2);
        let b = registry.array_of(BuiltinType::Int, 2);
        let c = registry.array_of(BuiltinType::Int, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.name(a), "Int[,]");
        assert_eq!(registry.array_elem_rank(c), Some((BuiltinType::Int.into(), 3)));
    }

    #[test]
    fn generic_instantiations_are_interned() {
        let mut registry = TypeRegistry::new();
        let a = registry.pair_of(BuiltinType::Int, BuiltinType::Str);
        let b = registry.pair_of(BuiltinType::Int, BuiltinType::Str);
        assert_eq!(a, b);
        assert_eq!(registry.name(a), "Pair<Int, Str>");
        assert_eq!(registry.descriptor(a).template(), Some(BuiltinType::Pair.into()));

        let sealed = registry.sealed_of(BuiltinType::Uri);
        assert!(registry.descriptor(sealed).is_marked_immutable());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_names_are_rejected() {
        let mut registry = TypeRegistry::new();
        registry.declare("Thing", TypeKind::RefStruct);
        registry.declare("Thing", TypeKind::RefStruct);
    }
}
