//! Copy context and context pool.
//!
//! The context is the identity map of one top-level copy: original heap id
//! to copy heap id, keyed by reference identity, never by structural
//! equality. Recording happens *before* field recursion, which is what
//! breaks cycles — a back-edge re-encountering an in-progress original
//! finds its partially-populated copy and reuses it.
//!
//! Contexts are pooled so tight copy loops don't reallocate the map. The
//! pool hands out empty contexts and clears them on release; a context is
//! used by at most one thread for the duration of a call.

use std::sync::Mutex;

use ahash::AHashMap;

use crate::heap::HeapId;

/// Identity map for a single top-level copy call.
#[derive(Debug, Default)]
pub struct CopyContext {
    map: AHashMap<HeapId, HeapId>,
}

impl CopyContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `original -> copy`. At most one copy per original: once
    /// recorded, the mapping is stable for the remainder of the call.
    ///
    /// # Panics
    /// Panics in debug builds if the original was already recorded with a
    /// different copy.
    pub fn record(&mut self, original: HeapId, copy: HeapId) {
        let previous = self.map.insert(original, copy);
        debug_assert!(
            previous.is_none_or(|p| p == copy),
            "identity mapping for {original} changed from {previous:?} to {copy}",
        );
    }

    /// The recorded copy for `original`, if it was already copied in this
    /// call.
    #[must_use]
    pub fn lookup(&self, original: HeapId) -> Option<HeapId> {
        self.map.get(&original).copied()
    }

    /// Number of recorded mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` when no mapping has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Forgets all mappings, keeping capacity for reuse.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Default retention bound for [`ContextPool`].
const DEFAULT_MAX_POOLED: usize = 16;

/// Briefly-locked freelist of reusable contexts.
///
/// Bounds allocation when the one-shot entry point is called in tight
/// loops: acquisition pops a pooled context (or creates one), release
/// clears it and pushes it back up to the retention bound.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<CopyContext>>,
    max_pooled: usize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOLED)
    }
}

impl ContextPool {
    /// Creates a pool retaining at most `max_pooled` idle contexts.
    #[must_use]
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_pooled,
        }
    }

    /// Hands out an empty context, reusing a pooled one when available.
    #[must_use]
    pub fn acquire(&self) -> CopyContext {
        let mut free = self.free.lock().expect("context pool lock poisoned");
        free.pop().unwrap_or_default()
    }

    /// Clears and returns a context to the pool. Contexts beyond the
    /// retention bound are dropped.
    pub fn release(&self, mut context: CopyContext) {
        context.clear();
        let mut free = self.free.lock().expect("context pool lock poisoned");
        if free.len() < self.max_pooled {
            free.push(context);
        }
    }

    /// Number of idle contexts currently pooled.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().expect("context pool lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup() {
        let mut context = CopyContext::new();
        assert_eq!(context.lookup(HeapId(0)), None);
        context.record(HeapId(0), HeapId(7));
        assert_eq!(context.lookup(HeapId(0)), Some(HeapId(7)));
        assert_eq!(context.len(), 1);
        context.clear();
        assert!(context.is_empty());
    }

    #[test]
    fn pool_reuses_released_contexts() {
        let pool = ContextPool::default();
        let mut context = pool.acquire();
        context.record(HeapId(1), HeapId(2));
        pool.release(context);
        assert_eq!(pool.idle(), 1);

        let reused = pool.acquire();
        assert!(reused.is_empty(), "released contexts must come back cleared");
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn pool_drops_contexts_beyond_bound() {
        let pool = ContextPool::new(1);
        pool.release(CopyContext::new());
        pool.release(CopyContext::new());
        assert_eq!(pool.idle(), 1);
    }
}
