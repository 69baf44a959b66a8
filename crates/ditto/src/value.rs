//! The runtime value type.
//!
//! A hybrid design, small immediate values stored inline and everything
//! else in the arena behind [`Value::Ref`]. Immediate variants are
//! trivially immutable, so the copy engine returns them unchanged; only
//! `Ref` values have identity and participate in the copy context.
//!
//! NOTE: the derived `PartialEq` compares `Ref` values by heap id, i.e. by
//! reference identity. Use [`Value::structurally_eq`] for value-wise graph
//! comparison.

use ahash::AHashSet;

use crate::{
    heap::{Heap, HeapData, HeapId},
    resource::ResourceTracker,
    types::{BuiltinType, TypeId},
};

/// A runtime value: an immediate scalar or a reference into the heap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The null reference.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Enumeration value: the enum type plus its discriminant.
    Enum(TypeId, i64),
    /// Opaque pointer-like handle. Carried by value, never dereferenced.
    Pointer(usize),
    /// Opaque function reference.
    FunctionRef(u32),
    /// Reflection meta-handle for a type. Process-global and immutable by
    /// convention; the dispatcher returns these unchanged.
    Type(TypeId),
    /// Reference to a heap-allocated object.
    Ref(HeapId),
}

impl Value {
    /// `true` for the null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The heap identity, when this value is a reference.
    #[must_use]
    pub fn heap_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Concrete runtime type of this value.
    ///
    /// For `Ref` values this is the type of the pointed-to object, which
    /// may be more derived than any static declaration that produced the
    /// reference; the dispatcher copies by this type, not the declared one.
    #[must_use]
    pub fn runtime_type<T: ResourceTracker>(&self, heap: &Heap<T>) -> TypeId {
        match self {
            Self::Null => BuiltinType::Null.into(),
            Self::Bool(_) => BuiltinType::Bool.into(),
            Self::Int(_) => BuiltinType::Int.into(),
            Self::Float(_) => BuiltinType::Float.into(),
            Self::Enum(type_id, _) => *type_id,
            Self::Pointer(_) => BuiltinType::Pointer.into(),
            Self::FunctionRef(_) => BuiltinType::FunctionRef.into(),
            Self::Type(_) => BuiltinType::Meta.into(),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => BuiltinType::Str.into(),
                HeapData::Bytes(_) => BuiltinType::Bytes.into(),
                HeapData::Decimal(_) => BuiltinType::Decimal.into(),
                HeapData::Timestamp(_) => BuiltinType::Timestamp.into(),
                HeapData::Span(_) => BuiltinType::Span.into(),
                HeapData::OffsetTimestamp(_) => BuiltinType::OffsetTimestamp.into(),
                HeapData::Uuid(_) => BuiltinType::Uuid.into(),
                HeapData::Version(_) => BuiltinType::Version.into(),
                HeapData::Uri(_) => BuiltinType::Uri.into(),
                HeapData::Array(array) => array.type_id,
                HeapData::Object(object) => object.type_id,
            },
        }
    }

    /// Structural (value-wise) equality over the object graphs rooted at
    /// `self` and `other`.
    ///
    /// Cycle-safe: a pair of nodes already under comparison is assumed
    /// equal, so isomorphic cyclic graphs compare equal and traversal
    /// terminates.
    #[must_use]
    pub fn structurally_eq<T: ResourceTracker>(&self, other: &Self, heap: &Heap<T>) -> bool {
        let mut in_progress: AHashSet<(HeapId, HeapId)> = AHashSet::new();
        structural_eq_inner(self, other, heap, &mut in_progress)
    }
}

fn structural_eq_inner<T: ResourceTracker>(
    left: &Value,
    right: &Value,
    heap: &Heap<T>,
    in_progress: &mut AHashSet<(HeapId, HeapId)>,
) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Enum(type_a, a), Value::Enum(type_b, b)) => type_a == type_b && a == b,
        (Value::Pointer(a), Value::Pointer(b)) => a == b,
        (Value::FunctionRef(a), Value::FunctionRef(b)) => a == b,
        (Value::Type(a), Value::Type(b)) => a == b,
        (Value::Ref(a), Value::Ref(b)) => {
            if a == b {
                return true;
            }
            if !in_progress.insert((*a, *b)) {
                // Already comparing this pair further up the walk.
                return true;
            }
            heap_data_eq(heap.get(*a), heap.get(*b), heap, in_progress)
        }
        _ => false,
    }
}

fn heap_data_eq<T: ResourceTracker>(
    left: &HeapData,
    right: &HeapData,
    heap: &Heap<T>,
    in_progress: &mut AHashSet<(HeapId, HeapId)>,
) -> bool {
    match (left, right) {
        (HeapData::Str(a), HeapData::Str(b)) | (HeapData::Uri(a), HeapData::Uri(b)) => a == b,
        (HeapData::Bytes(a), HeapData::Bytes(b)) => a == b,
        (HeapData::Decimal(a), HeapData::Decimal(b)) => a == b,
        (HeapData::Timestamp(a), HeapData::Timestamp(b)) => a == b,
        (HeapData::Span(a), HeapData::Span(b)) => a == b,
        (HeapData::OffsetTimestamp(a), HeapData::OffsetTimestamp(b)) => a == b,
        (HeapData::Uuid(a), HeapData::Uuid(b)) => a == b,
        (HeapData::Version(a), HeapData::Version(b)) => a == b,
        (HeapData::Array(a), HeapData::Array(b)) => {
            a.type_id == b.type_id
                && a.dims == b.dims
                && a.data
                    .iter()
                    .zip(b.data.iter())
                    .all(|(x, y)| structural_eq_inner(x, y, heap, in_progress))
        }
        (HeapData::Object(a), HeapData::Object(b)) => {
            a.type_id == b.type_id
                && a.fields.len() == b.fields.len()
                && a.fields
                    .iter()
                    .zip(b.fields.iter())
                    .all(|(x, y)| structural_eq_inner(x, y, heap, in_progress))
        }
        _ => false,
    }
}
