//! Per-type copier plans: the factory and the plan executor.
//!
//! The factory synthesizes one [`CopierPlan`] per concrete type and
//! memoizes it in the engine's shared plan cache. A plan is the
//! precomputed per-field decision table the copy policy produces at
//! construction time — at copy time no policy question is asked again,
//! the executor just walks the table.

use crate::{
    context::CopyContext,
    engine::DeepCopier,
    error::{CopyError, CopyResult},
    heap::{Heap, HeapData, HeapId, ObjectData},
    policy::Policy,
    resource::ResourceTracker,
    tracer::CopyTracer,
    types::{TypeId, TypeKind},
    value::Value,
};

/// Treatment of one layout slot, fixed when the plan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldAction {
    /// Store the original slot value unchanged. Used for fields whose
    /// declared type is immutable and closed to runtime substitution, and
    /// for excluded opaque-kind fields, which retain the original's handle
    /// value.
    Alias,
    /// Duplicate the slot's value-struct payload without recursing.
    Shallow,
    /// Dispatch on the slot's runtime value.
    Recurse,
}

/// Specialized copy routine for one concrete type.
#[derive(Debug)]
pub(crate) enum CopierPlan {
    /// Instances are aliased: the copy is the original.
    Identity,
    /// Shallow-copyable value struct: duplicate the slots, recurse nowhere.
    ShallowValue,
    /// Mutable composite: allocate, register identity (reference types),
    /// then apply one action per layout slot.
    Object {
        type_id: TypeId,
        /// Value structs skip identity registration; they cannot be shared.
        by_value: bool,
        /// One action per layout slot, in slot order.
        actions: Vec<FieldAction>,
    },
    /// Arrays are handed to the rank-specialized array copier.
    Array,
}

/// Builds the plan for a concrete type. Called on plan-cache misses only.
pub(crate) fn build_plan<Tr: CopyTracer>(
    engine: &DeepCopier,
    type_id: TypeId,
    tracer: &mut Tr,
) -> CopyResult<CopierPlan> {
    let registry = engine.registry();
    let descriptor = registry.descriptor(type_id);

    if matches!(descriptor.kind(), TypeKind::ByRef) {
        return Err(CopyError::UnsupportedType {
            type_name: descriptor.name().to_owned(),
        });
    }

    match engine.classify_for(type_id, tracer) {
        Policy::Immutable => return Ok(CopierPlan::Identity),
        Policy::ShallowCopyable => return Ok(CopierPlan::ShallowValue),
        Policy::Mutable => {}
    }

    if matches!(descriptor.kind(), TypeKind::Array { .. }) {
        return Ok(CopierPlan::Array);
    }

    let by_value = match descriptor.kind() {
        TypeKind::ValueStruct => true,
        TypeKind::RefStruct => false,
        // A mutable non-composite, non-array type is one the introspector
        // cannot describe.
        _ => {
            return Err(CopyError::UnsupportedType {
                type_name: descriptor.name().to_owned(),
            });
        }
    };
    if !descriptor.defined {
        return Err(CopyError::UnsupportedType {
            type_name: descriptor.name().to_owned(),
        });
    }

    let mut actions = Vec::with_capacity(descriptor.layout().len());
    for slot in 0..descriptor.layout().len() {
        if descriptor.copyable_slots().binary_search(&slot).is_err() {
            // Excluded opaque-kind field: the copy keeps the original's
            // handle value.
            actions.push(FieldAction::Alias);
            continue;
        }
        let declared = descriptor.layout()[slot].declared;
        let action = if alias_safe_declared(engine, declared, tracer) {
            FieldAction::Alias
        } else if engine.classify_for(declared, tracer) == Policy::ShallowCopyable {
            FieldAction::Shallow
        } else {
            // Mutable, or immutable-classified but open to runtime
            // substitution: the dispatcher decides per value.
            FieldAction::Recurse
        };
        actions.push(action);
    }

    Ok(CopierPlan::Object {
        type_id,
        by_value,
        actions,
    })
}

/// Whether a declared type's immutability can be trusted without looking
/// at the runtime value.
///
/// A field or array slot declared as a reference struct may hold a derived
/// instance at run time, and a derived type can add mutable state even
/// when its base classifies immutable. Static aliasing is therefore
/// reserved for declared kinds that admit no runtime substitution;
/// reference-struct slots go through full dispatch, which still aliases
/// genuinely immutable runtime types via their identity plans.
pub(crate) fn alias_safe_declared<Tr: CopyTracer>(
    engine: &DeepCopier,
    declared: TypeId,
    tracer: &mut Tr,
) -> bool {
    if engine.classify_for(declared, tracer) != Policy::Immutable {
        return false;
    }
    !matches!(engine.registry().kind(declared), TypeKind::RefStruct)
}

/// Executes an `Object` plan: allocate, register identity, populate.
pub(crate) fn run_object_plan<T: ResourceTracker, Tr: CopyTracer>(
    engine: &DeepCopier,
    heap: &mut Heap<T>,
    original: HeapId,
    type_id: TypeId,
    by_value: bool,
    actions: &[FieldAction],
    context: &mut CopyContext,
    tracer: &mut Tr,
    depth: usize,
) -> CopyResult<Value> {
    let source_fields = match heap.get(original) {
        HeapData::Object(object) => {
            debug_assert_eq!(object.type_id, type_id, "plan fetched for a different runtime type");
            object.fields.clone()
        }
        other => {
            return Err(CopyError::InvariantViolation(format!(
                "object copier received a non-object value ({variant})",
                variant = other.variant_name()
            )));
        }
    };

    let registry = engine.registry();
    let descriptor = registry.descriptor(type_id);

    // Allocate the result: no-arg constructor when registered, the
    // uninitialized-instance factory otherwise.
    let initial_fields = match registry.ctor(type_id) {
        Some(ctor) => {
            let fields = ctor().map_err(|reason| CopyError::ConstructionFailure {
                type_name: descriptor.name().to_owned(),
                reason,
            })?;
            if fields.len() != descriptor.layout().len() {
                return Err(CopyError::ConstructionFailure {
                    type_name: descriptor.name().to_owned(),
                    reason: format!(
                        "constructor produced {got} fields, layout has {expected}",
                        got = fields.len(),
                        expected = descriptor.layout().len()
                    ),
                });
            }
            fields
        }
        None => registry.uninitialized_fields(type_id),
    };
    let copy_id = heap.allocate(HeapData::Object(ObjectData {
        type_id,
        fields: initial_fields,
    }))?;

    // Register identity before recursing so cycle back-edges find the
    // in-progress copy. Value structs cannot be shared and skip this.
    if !by_value {
        context.record(original, copy_id);
    }

    let mut copied_fields = Vec::with_capacity(source_fields.len());
    for (slot, action) in actions.iter().enumerate() {
        let source = source_fields[slot];
        let copied = match action {
            FieldAction::Alias => source,
            FieldAction::Shallow => shallow_duplicate(heap, source)?,
            FieldAction::Recurse => engine.copy_value(heap, source, context, tracer, depth + 1)?,
        };
        copied_fields.push(copied);
    }
    match heap.get_mut(copy_id) {
        HeapData::Object(object) => object.fields = copied_fields,
        _ => unreachable!("object placeholder replaced with non-object data"),
    }

    tracer.on_object_copied(descriptor.name(), depth);
    Ok(Value::Ref(copy_id))
}

/// Executes a `ShallowValue` plan: duplicate the instance's slots without
/// recursing into them.
pub(crate) fn run_shallow_value<T: ResourceTracker>(heap: &mut Heap<T>, original: HeapId) -> CopyResult<Value> {
    let duplicated = match heap.get(original) {
        HeapData::Object(object) => ObjectData {
            type_id: object.type_id,
            fields: object.fields.clone(),
        },
        other => {
            return Err(CopyError::InvariantViolation(format!(
                "shallow value copier received a non-object value ({variant})",
                variant = other.variant_name()
            )));
        }
    };
    let copy_id = heap.allocate(HeapData::Object(duplicated))?;
    Ok(Value::Ref(copy_id))
}

/// Duplicates a shallow-copyable field value by value bits.
///
/// In the runtime model a value-struct instance lives behind a `Ref`, so
/// "store the bits unchanged" means allocating a slot-for-slot duplicate;
/// aliasing the ref would share mutable storage and break value semantics.
pub(crate) fn shallow_duplicate<T: ResourceTracker>(heap: &mut Heap<T>, value: Value) -> CopyResult<Value> {
    match value {
        Value::Ref(id) => match heap.get(id) {
            HeapData::Object(_) => run_shallow_value(heap, id),
            // Non-object payloads under a shallow-copyable declared type
            // are immutable by construction; alias them.
            _ => Ok(value),
        },
        _ => Ok(value),
    }
}
