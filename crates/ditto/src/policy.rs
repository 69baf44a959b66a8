//! Copy-policy classification.
//!
//! For every type the engine encounters, `classify` answers one question:
//! may instances be aliased (`Immutable`), duplicated without recursion
//! (`ShallowCopyable`), or must they be deep-copied (`Mutable`)?
//! Classification always succeeds; when in doubt the answer is `Mutable`.
//!
//! Results are memoized in a cache shared across threads. The cache is
//! read-mostly: concurrent readers proceed without contention, and
//! duplicate computation during a race is harmless because classification
//! is deterministic.

use std::sync::RwLock;

use ahash::{AHashMap, AHashSet};

use crate::types::{TypeId, TypeKind, TypeRegistry};

/// Copy treatment for instances of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Policy {
    /// Instances are aliased, never copied.
    Immutable,
    /// Instances may be duplicated without recursing into fields.
    ShallowCopyable,
    /// Instances must be deep-copied field-by-field (or element-by-element
    /// for arrays).
    Mutable,
}

/// Memoizing classifier.
#[derive(Debug)]
pub(crate) struct PolicyStore {
    /// Caller-configured additions to the immutable seed set.
    extra_immutable: AHashSet<TypeId>,
    cache: RwLock<AHashMap<TypeId, Policy>>,
}

impl PolicyStore {
    pub(crate) fn new(extra_immutable: impl IntoIterator<Item = TypeId>) -> Self {
        Self {
            extra_immutable: extra_immutable.into_iter().collect(),
            cache: RwLock::new(AHashMap::new()),
        }
    }

    /// Classifies a type, consulting and filling the shared cache.
    pub(crate) fn classify(&self, id: TypeId, registry: &TypeRegistry) -> Policy {
        self.classify_traced(id, registry, &mut |_, _| {})
    }

    /// Classifies a type, invoking `on_fresh` for every classification that
    /// was actually computed rather than served from cache.
    pub(crate) fn classify_traced(
        &self,
        id: TypeId,
        registry: &TypeRegistry,
        on_fresh: &mut dyn FnMut(&str, Policy),
    ) -> Policy {
        let mut visiting = AHashSet::new();
        self.classify_inner(id, registry, &mut visiting, on_fresh)
    }

    fn classify_inner(
        &self,
        id: TypeId,
        registry: &TypeRegistry,
        visiting: &mut AHashSet<TypeId>,
        on_fresh: &mut dyn FnMut(&str, Policy),
    ) -> Policy {
        if let Some(&policy) = self.cache.read().expect("policy cache lock poisoned").get(&id) {
            return policy;
        }
        if !visiting.insert(id) {
            // Re-entered through a field cycle: answer conservatively for
            // the in-progress type without caching the provisional result.
            // Self-recursive value types end up Mutable through this path.
            return Policy::Mutable;
        }
        let policy = self.compute(id, registry, visiting, on_fresh);
        visiting.remove(&id);
        self.cache
            .write()
            .expect("policy cache lock poisoned")
            .insert(id, policy);
        on_fresh(registry.name(id), policy);
        policy
    }

    fn compute(
        &self,
        id: TypeId,
        registry: &TypeRegistry,
        visiting: &mut AHashSet<TypeId>,
        on_fresh: &mut dyn FnMut(&str, Policy),
    ) -> Policy {
        let descriptor = registry.descriptor(id);

        // Rule 1: the immutable seed set, plus configured extensions.
        if registry.is_seed_immutable(id) || self.extra_immutable.contains(&id) {
            return Policy::Immutable;
        }

        // Rule 2: user-supplied immutable marker.
        if descriptor.is_marked_immutable() {
            return Policy::Immutable;
        }

        // Rule 3: primitive-kinded types are treated as values outright.
        // Rule 4: arrays can never be aliasing-proved by policy alone.
        match descriptor.kind() {
            TypeKind::Enum | TypeKind::Pointer | TypeKind::FunctionRef | TypeKind::Meta => {
                return Policy::Immutable;
            }
            TypeKind::Array { .. } | TypeKind::ByRef => return Policy::Mutable,
            TypeKind::Primitive | TypeKind::Str | TypeKind::Bytes | TypeKind::WellKnown => {
                // Seed kinds are caught by rule 1; reaching here means a
                // registry extension we don't know, keep it safe.
                return Policy::Mutable;
            }
            TypeKind::ValueStruct | TypeKind::RefStruct => {}
        }

        // Rule 7: a generic instantiation inherits its template's seed
        // entry, but only when every type argument is itself immutable.
        if let Some(template) = descriptor.template() {
            let template_descriptor = registry.descriptor(template);
            let template_seeded = template_descriptor.is_marked_immutable()
                || registry.is_seed_immutable(template)
                || self.extra_immutable.contains(&template);
            if template_seeded {
                let all_args_immutable = descriptor
                    .type_args()
                    .iter()
                    .all(|&arg| self.classify_inner(arg, registry, visiting, on_fresh) == Policy::Immutable);
                if all_args_immutable {
                    return Policy::Immutable;
                }
            }
        }

        match descriptor.kind() {
            // Rule 5: a value composite whose every copyable field is
            // immutable (and which is not self-referential, which the
            // visiting guard forces to Mutable) can be duplicated by value
            // bits.
            TypeKind::ValueStruct => {
                let all_immutable = descriptor.copyable_slots().iter().all(|&slot| {
                    let field = &descriptor.layout()[slot];
                    self.classify_inner(field.declared, registry, visiting, on_fresh) == Policy::Immutable
                });
                if all_immutable {
                    Policy::ShallowCopyable
                } else {
                    Policy::Mutable
                }
            }
            // Rule 6: a reference type is immutable only when every
            // copyable field is read-only *and* of immutable type.
            TypeKind::RefStruct => {
                let provably_immutable = descriptor.copyable_slots().iter().all(|&slot| {
                    let field = &descriptor.layout()[slot];
                    field.read_only
                        && self.classify_inner(field.declared, registry, visiting, on_fresh) == Policy::Immutable
                });
                if provably_immutable {
                    Policy::Immutable
                } else {
                    Policy::Mutable
                }
            }
            _ => unreachable!("non-composite kinds returned above"),
        }
    }
}
