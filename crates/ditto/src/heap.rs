//! Arena heap backing every reference-like runtime value.
//!
//! Objects live in a slot vector and are addressed by [`HeapId`]; the id is
//! the object's runtime identity, which is exactly what the copy context
//! keys on. The arena grows monotonically over a session and is released
//! wholesale via [`Heap::clear`] — the copy engine never frees individual
//! objects, so there is no free list and no per-object bookkeeping beyond
//! the payload itself.
//!
//! The heap is generic over a [`ResourceTracker`] so allocation checks
//! compile away under [`NoLimitTracker`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::{
    resource::{NoLimitTracker, ResourceError, ResourceTracker},
    types::{Decimal, TypeId, TypeRegistry, Version},
    value::Value,
};

/// Identity of a heap-allocated object: its slot index in the arena.
///
/// Two values alias the same object exactly when their ids are equal. Slots
/// are never reused within a session, so ids stay unambiguous until
/// [`Heap::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub(crate) usize);

impl HeapId {
    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{index}", index = self.0)
    }
}

/// Inline capacity for array dimension and stride tables. Rank > 4 arrays
/// exist but are rare enough to spill.
pub(crate) type Dims = SmallVec<[usize; 4]>;

/// Payload of a rank-aware fixed-shape array.
///
/// Storage is a flat row-major vector; `dims` holds one length per
/// dimension and their product equals `data.len()`.
#[derive(Debug, Clone)]
pub struct ArrayData {
    pub(crate) type_id: TypeId,
    pub(crate) dims: Dims,
    pub(crate) data: Vec<Value>,
}

impl ArrayData {
    /// The array's registered type (which fixes element type and rank).
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Per-dimension lengths.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Flat element storage, row-major.
    #[must_use]
    pub fn elements(&self) -> &[Value] {
        &self.data
    }

    /// Mutable flat element storage.
    pub fn elements_mut(&mut self) -> &mut [Value] {
        &mut self.data
    }
}

/// Payload of a composite instance: its concrete type plus one slot per
/// layout field, in registry layout order.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub(crate) type_id: TypeId,
    pub(crate) fields: Vec<Value>,
}

impl ObjectData {
    /// The instance's concrete type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Field slots in layout order.
    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Mutable field slots.
    pub fn fields_mut(&mut self) -> &mut [Value] {
        &mut self.fields
    }
}

/// Heap-allocated payloads.
///
/// The scalar-like variants (`Str` through `Uri`) are immutable by
/// convention: nothing in the engine or the public surface mutates them
/// after allocation, which is what lets the copy policy alias them.
#[derive(Debug, Clone, strum::IntoStaticStr)]
pub enum HeapData {
    /// Canonical string.
    Str(String),
    /// Immutable byte string.
    Bytes(Vec<u8>),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// Absolute UTC instant.
    Timestamp(DateTime<Utc>),
    /// Signed duration.
    Span(TimeDelta),
    /// Instant with a retained UTC offset.
    OffsetTimestamp(DateTime<FixedOffset>),
    /// Globally-unique identifier.
    Uuid(Uuid),
    /// Four-part version tuple.
    Version(Version),
    /// URI kept in string form.
    Uri(String),
    /// Rank-aware array.
    Array(ArrayData),
    /// Composite instance.
    Object(ObjectData),
}

impl HeapData {
    /// Static variant name, used for stats breakdowns.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        self.into()
    }

    /// Approximate payload size in bytes, for memory accounting.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        base + match self {
            Self::Str(s) | Self::Uri(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::Decimal(d) => (d.coefficient().bits() as usize).div_ceil(8),
            Self::Timestamp(_) | Self::Span(_) | Self::OffsetTimestamp(_) | Self::Uuid(_) | Self::Version(_) => 0,
            Self::Array(a) => a.data.len() * std::mem::size_of::<Value>(),
            Self::Object(o) => o.fields.len() * std::mem::size_of::<Value>(),
        }
    }
}

/// Snapshot of heap contents: how many live objects, broken down by variant.
///
/// `objects_by_type` uses a `BTreeMap` for deterministic iteration order,
/// making snapshots directly comparable and printable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of objects in the arena.
    pub live_objects: usize,
    /// Count of objects per `HeapData` variant name.
    pub objects_by_type: BTreeMap<&'static str, usize>,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapStats: {count} live objects", count = self.live_objects)?;
        for (&type_name, &count) in &self.objects_by_type {
            write!(f, "\n  {type_name}: {count}")?;
        }
        Ok(())
    }
}

/// Arena of heap objects, generic over the resource tracker.
#[derive(Debug)]
pub struct Heap<T: ResourceTracker = NoLimitTracker> {
    entries: Vec<HeapData>,
    tracker: T,
}

impl Default for Heap<NoLimitTracker> {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap<NoLimitTracker> {
    /// Creates an unlimited heap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tracker(NoLimitTracker)
    }
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates a heap with the given resource tracker.
    #[must_use]
    pub fn with_tracker(tracker: T) -> Self {
        Self {
            entries: Vec::new(),
            tracker,
        }
    }

    /// Allocates a payload and returns its identity.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(|| data.estimate_size())?;
        let id = HeapId(self.entries.len());
        self.entries.push(data);
        Ok(id)
    }

    /// Borrows the payload at `id`.
    ///
    /// # Panics
    /// Panics if the id was not issued by this heap.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.0]
    }

    /// Mutably borrows the payload at `id`.
    ///
    /// # Panics
    /// Panics if the id was not issued by this heap.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.0]
    }

    /// The resource tracker.
    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every object and resets the tracker. All outstanding
    /// [`HeapId`]s become invalid.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tracker.on_clear();
    }

    /// Current heap snapshot.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        for entry in &self.entries {
            *objects_by_type.entry(entry.variant_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.entries.len(),
            objects_by_type,
        }
    }

    // --- graph-building convenience allocators ---

    /// Allocates a string and returns a `Ref` to it.
    pub fn alloc_str(&mut self, value: impl Into<String>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Str(value.into()))?))
    }

    /// Allocates a byte string.
    pub fn alloc_bytes(&mut self, value: impl Into<Vec<u8>>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Bytes(value.into()))?))
    }

    /// Allocates a decimal.
    pub fn alloc_decimal(&mut self, value: Decimal) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Decimal(value))?))
    }

    /// Allocates a UTC timestamp.
    pub fn alloc_timestamp(&mut self, value: DateTime<Utc>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Timestamp(value))?))
    }

    /// Allocates a duration span.
    pub fn alloc_span(&mut self, value: TimeDelta) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Span(value))?))
    }

    /// Allocates a timestamp with retained offset.
    pub fn alloc_offset_timestamp(&mut self, value: DateTime<FixedOffset>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::OffsetTimestamp(value))?))
    }

    /// Allocates a uuid.
    pub fn alloc_uuid(&mut self, value: Uuid) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Uuid(value))?))
    }

    /// Allocates a version tuple.
    pub fn alloc_version(&mut self, value: Version) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Version(value))?))
    }

    /// Allocates a URI.
    pub fn alloc_uri(&mut self, value: impl Into<String>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Uri(value.into()))?))
    }

    /// Allocates an array of the given registered array type.
    ///
    /// # Panics
    /// Panics if `type_id` is not an array type, the dimension count does
    /// not match the type's rank, or the element count does not match the
    /// product of the dimensions.
    pub fn alloc_array(
        &mut self,
        registry: &TypeRegistry,
        type_id: TypeId,
        dims: impl IntoIterator<Item = usize>,
        data: Vec<Value>,
    ) -> Result<Value, ResourceError> {
        let dims: Dims = dims.into_iter().collect();
        let (_, rank) = registry
            .array_elem_rank(type_id)
            .unwrap_or_else(|| panic!("'{name}' is not an array type", name = registry.name(type_id)));
        assert!(
            dims.len() == rank,
            "array type '{name}' has rank {rank}, got {got} dimensions",
            name = registry.name(type_id),
            got = dims.len(),
        );
        let expected: usize = dims.iter().product();
        assert!(
            data.len() == expected,
            "array shape {dims:?} requires {expected} elements, got {got}",
            got = data.len(),
        );
        let id = self.allocate(HeapData::Array(ArrayData { type_id, dims, data }))?;
        Ok(Value::Ref(id))
    }

    /// Allocates a composite instance with the given field slots in layout
    /// order.
    ///
    /// # Panics
    /// Panics if `type_id` is not a defined composite type or the slot
    /// count does not match its layout.
    pub fn alloc_object(
        &mut self,
        registry: &TypeRegistry,
        type_id: TypeId,
        fields: Vec<Value>,
    ) -> Result<Value, ResourceError> {
        let descriptor = registry.descriptor(type_id);
        assert!(
            descriptor.layout().len() == fields.len(),
            "type '{name}' has {expected} layout fields, got {got}",
            name = descriptor.name(),
            expected = descriptor.layout().len(),
            got = fields.len(),
        );
        let id = self.allocate(HeapData::Object(ObjectData { type_id, fields }))?;
        Ok(Value::Ref(id))
    }
}
