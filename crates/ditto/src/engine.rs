//! The dispatcher and the public copy surface.
//!
//! [`DeepCopier`] owns the type registry and the shared caches (policy,
//! plans, pooled contexts). It is cheap to share: all copy entry points
//! take `&self`, so one engine can serve any number of threads, each
//! bringing its own heap and leasing its own context.

use std::{
    collections::hash_map::Entry,
    sync::{Arc, RwLock},
};

use ahash::AHashMap;

use crate::{
    array,
    context::{ContextPool, CopyContext},
    copier::{self, CopierPlan},
    error::{CopyError, CopyResult},
    heap::{ArrayData, Heap, HeapData},
    policy::{Policy, PolicyStore},
    resource::ResourceTracker,
    tracer::{CopyTracer, NoopTracer},
    types::{TypeId, TypeKind, TypeRegistry},
    value::Value,
};

/// Construction-time engine configuration.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Additional types to treat as part of the immutable seed set.
    pub immutable_types: Vec<TypeId>,
    /// Maximum idle contexts retained by the pool. `None` keeps the
    /// default bound.
    pub max_pooled_contexts: Option<usize>,
}

/// The deep-copy engine.
///
/// Holds the registry plus the caches that make repeated copies fast:
/// per-type policies, per-type copier plans, and a pool of reusable copy
/// contexts. All shared state is safe under concurrent readers; a single
/// [`CopyContext`] is still single-threaded for the duration of one
/// top-level call.
#[derive(Debug)]
pub struct DeepCopier {
    registry: TypeRegistry,
    policies: PolicyStore,
    plans: RwLock<AHashMap<TypeId, Arc<CopierPlan>>>,
    pool: ContextPool,
}

impl DeepCopier {
    /// Creates an engine over a fully-registered type registry.
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_options(registry, CopyOptions::default())
    }

    /// Creates an engine with seed-set extensions and pool tuning.
    #[must_use]
    pub fn with_options(registry: TypeRegistry, options: CopyOptions) -> Self {
        let pool = match options.max_pooled_contexts {
            Some(bound) => ContextPool::new(bound),
            None => ContextPool::default(),
        };
        Self {
            registry,
            policies: PolicyStore::new(options.immutable_types),
            plans: RwLock::new(AHashMap::new()),
            pool,
        }
    }

    /// The engine's type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Copy policy for a type, computed on first use and cached.
    #[must_use]
    pub fn classify(&self, type_id: TypeId) -> Policy {
        self.policies.classify(type_id, &self.registry)
    }

    /// Number of idle contexts currently held by the pool.
    #[must_use]
    pub fn pooled_contexts(&self) -> usize {
        self.pool.idle()
    }

    /// One-shot deep copy: leases a context from the pool, copies, and
    /// releases the context cleared — on success and on failure alike.
    pub fn copy<T: ResourceTracker>(&self, heap: &mut Heap<T>, value: Value) -> CopyResult<Value> {
        self.copy_traced(heap, value, &mut NoopTracer)
    }

    /// One-shot deep copy with a caller-supplied tracer.
    pub fn copy_traced<T: ResourceTracker, Tr: CopyTracer>(
        &self,
        heap: &mut Heap<T>,
        value: Value,
        tracer: &mut Tr,
    ) -> CopyResult<Value> {
        let mut context = self.pool.acquire();
        let result = self.copy_with_traced(heap, value, &mut context, tracer);
        self.pool.release(context);
        result
    }

    /// Re-entrant deep copy against a caller-owned context.
    ///
    /// Reusing one context across calls preserves referential continuity:
    /// an object copied by an earlier call is aliased, not re-copied, by
    /// later calls.
    pub fn copy_with<T: ResourceTracker>(
        &self,
        heap: &mut Heap<T>,
        value: Value,
        context: &mut CopyContext,
    ) -> CopyResult<Value> {
        self.copy_with_traced(heap, value, context, &mut NoopTracer)
    }

    /// Re-entrant deep copy with a caller-supplied tracer.
    pub fn copy_with_traced<T: ResourceTracker, Tr: CopyTracer>(
        &self,
        heap: &mut Heap<T>,
        value: Value,
        context: &mut CopyContext,
        tracer: &mut Tr,
    ) -> CopyResult<Value> {
        self.copy_value(heap, value, context, tracer, 0)
    }

    /// One-level shallow copy.
    ///
    /// Containers and mutable composites are duplicated one level deep
    /// with their slots aliased; immutable values are returned unchanged.
    pub fn shallow_copy<T: ResourceTracker>(&self, heap: &mut Heap<T>, value: Value) -> CopyResult<Value> {
        let Value::Ref(id) = value else {
            return Ok(value);
        };
        // Extract first, allocate after, so no heap borrow is held across
        // the allocation.
        enum ShallowSource {
            Array(ArrayData),
            Object(TypeId),
            Immutable,
        }
        let source = match heap.get(id) {
            HeapData::Array(array) => ShallowSource::Array(array.clone()),
            HeapData::Object(object) => ShallowSource::Object(object.type_id()),
            // Immutable heap payloads are aliased.
            _ => ShallowSource::Immutable,
        };
        match source {
            ShallowSource::Array(duplicated) => Ok(Value::Ref(heap.allocate(HeapData::Array(duplicated))?)),
            ShallowSource::Object(type_id) => {
                if matches!(self.registry.kind(type_id), TypeKind::ByRef) {
                    return Err(CopyError::UnsupportedType {
                        type_name: self.registry.name(type_id).to_owned(),
                    });
                }
                if self.classify(type_id) == Policy::Immutable {
                    return Ok(value);
                }
                copier::run_shallow_value(heap, id)
            }
            ShallowSource::Immutable => Ok(value),
        }
    }

    /// The dispatcher: single entry point for external calls and for the
    /// recursive descent of plans and array copies.
    ///
    /// Routes on the value's **runtime** type, so a field declared as a
    /// base type but holding a derived instance is copied with the derived
    /// layout.
    pub(crate) fn copy_value<T: ResourceTracker, Tr: CopyTracer>(
        &self,
        heap: &mut Heap<T>,
        value: Value,
        context: &mut CopyContext,
        tracer: &mut Tr,
        depth: usize,
    ) -> CopyResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            // Meta-handles are process-global and immutable by convention.
            Value::Type(_) => Ok(value),
            // Immediate scalars carry no identity and no mutable state.
            Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Enum(_, _)
            | Value::Pointer(_)
            | Value::FunctionRef(_) => Ok(value),
            Value::Ref(id) => {
                heap.tracker_mut().on_recursion(depth)?;
                if let Some(copy) = context.lookup(id) {
                    tracer.on_identity_hit(id.index());
                    return Ok(Value::Ref(copy));
                }
                let runtime_type = value.runtime_type(heap);
                if matches!(self.registry.kind(runtime_type), TypeKind::Array { .. }) {
                    return array::copy_array(self, heap, id, context, tracer, depth);
                }
                let plan = self.plan_for(runtime_type, tracer)?;
                match &*plan {
                    CopierPlan::Identity => Ok(value),
                    CopierPlan::ShallowValue => copier::run_shallow_value(heap, id),
                    CopierPlan::Object {
                        type_id,
                        by_value,
                        actions,
                    } => copier::run_object_plan(
                        self, heap, id, *type_id, *by_value, actions, context, tracer, depth,
                    ),
                    CopierPlan::Array => array::copy_array(self, heap, id, context, tracer, depth),
                }
            }
        }
    }

    /// Policy lookup that reports fresh computations to the tracer.
    pub(crate) fn classify_for<Tr: CopyTracer>(&self, type_id: TypeId, tracer: &mut Tr) -> Policy {
        self.policies
            .classify_traced(type_id, &self.registry, &mut |name, policy| {
                tracer.on_classify(name, policy);
            })
    }

    /// Fetches or builds the memoized plan for a concrete type.
    ///
    /// Concurrent construction of the same entry is tolerated; the first
    /// entry to land stays visible and losers adopt it, so all callers see
    /// one functionally-equivalent plan.
    pub(crate) fn plan_for<Tr: CopyTracer>(&self, type_id: TypeId, tracer: &mut Tr) -> CopyResult<Arc<CopierPlan>> {
        if let Some(plan) = self.plans.read().expect("plan cache lock poisoned").get(&type_id) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(copier::build_plan(self, type_id, tracer)?);
        let mut plans = self.plans.write().expect("plan cache lock poisoned");
        match plans.entry(type_id) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&plan));
                drop(plans);
                tracer.on_plan_built(self.registry.name(type_id));
                Ok(plan)
            }
        }
    }
}
