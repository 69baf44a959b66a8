//! Rank-specialized array copying.
//!
//! Arrays need distinct code paths by rank and element policy: rank-1 and
//! rank-2 arrays get direct loops, higher ranks go through a generic
//! N-dimensional walker that advances a coordinate odometer against a
//! stride table. Arrays whose declared element type is immutable and
//! closed to runtime substitution are block-copied at any rank: the
//! element storage is duplicated wholesale and every element aliased.
//! Reference-struct element types dispatch per slot instead, since a slot
//! may hold a derived mutable instance.
//!
//! Intra-array aliasing of mutable elements is preserved by the copy
//! context, exactly as for object fields: the per-slot dispatch consults
//! the identity map before copying.

use crate::{
    context::CopyContext,
    copier,
    engine::DeepCopier,
    error::{CopyError, CopyResult},
    heap::{ArrayData, Dims, Heap, HeapData, HeapId},
    resource::ResourceTracker,
    tracer::CopyTracer,
    value::Value,
};

/// Copies the array at `original`, routing by rank and element policy.
pub(crate) fn copy_array<T: ResourceTracker, Tr: CopyTracer>(
    engine: &DeepCopier,
    heap: &mut Heap<T>,
    original: HeapId,
    context: &mut CopyContext,
    tracer: &mut Tr,
    depth: usize,
) -> CopyResult<Value> {
    let (type_id, dims, source) = match heap.get(original) {
        HeapData::Array(array) => (array.type_id, array.dims.clone(), array.data.clone()),
        other => {
            return Err(CopyError::InvariantViolation(format!(
                "array copier received a non-array value ({variant})",
                variant = other.variant_name()
            )));
        }
    };
    let Some((elem, rank)) = engine.registry().array_elem_rank(type_id) else {
        return Err(CopyError::InvariantViolation(format!(
            "array object carries non-array type '{name}'",
            name = engine.registry().name(type_id)
        )));
    };
    debug_assert_eq!(rank, dims.len(), "array shape out of sync with its type");

    // An empty rank-1 array is observationally immutable. Returning it
    // unchanged is an optimization, not a contract.
    if rank == 1 && source.is_empty() {
        return Ok(Value::Ref(original));
    }

    let len = source.len();

    if copier::alias_safe_declared(engine, elem, tracer) {
        // Same path for every rank: duplicate the element storage
        // wholesale and record identity. Elements stay aliased. Only taken
        // when the declared element kind admits no runtime substitution,
        // so every element really is immutable.
        let copy_id = heap.allocate(HeapData::Array(ArrayData {
            type_id,
            dims,
            data: source,
        }))?;
        context.record(original, copy_id);
        tracer.on_array_copied(rank, len);
        return Ok(Value::Ref(copy_id));
    }

    // Per-slot dispatch: allocate a same-shape placeholder, record
    // identity before descending, then dispatch each element.
    let copy_id = heap.allocate(HeapData::Array(ArrayData {
        type_id,
        dims: dims.clone(),
        data: vec![Value::Null; len],
    }))?;
    context.record(original, copy_id);

    // A zero-length dimension leaves nothing to visit; the same-shape
    // placeholder is already the finished copy.
    if len == 0 {
        tracer.on_array_copied(rank, len);
        return Ok(Value::Ref(copy_id));
    }

    match rank {
        1 => {
            for (index, element) in source.into_iter().enumerate() {
                let copied = engine.copy_value(heap, element, context, tracer, depth + 1)?;
                write_slot(heap, copy_id, index, copied);
            }
        }
        2 => {
            let (rows, cols) = (dims[0], dims[1]);
            for row in 0..rows {
                for col in 0..cols {
                    let index = row * cols + col;
                    let copied = engine.copy_value(heap, source[index], context, tracer, depth + 1)?;
                    write_slot(heap, copy_id, index, copied);
                }
            }
        }
        _ => {
            let strides = stride_table(&dims);
            let mut coordinate: Dims = Dims::from_elem(0, rank);
            loop {
                let index = linear_offset(&coordinate, &strides);
                let copied = engine.copy_value(heap, source[index], context, tracer, depth + 1)?;
                write_slot(heap, copy_id, index, copied);
                if !advance(&mut coordinate, &dims) {
                    break;
                }
            }
        }
    }

    tracer.on_array_copied(rank, len);
    Ok(Value::Ref(copy_id))
}

fn write_slot<T: ResourceTracker>(heap: &mut Heap<T>, array_id: HeapId, index: usize, value: Value) {
    match heap.get_mut(array_id) {
        HeapData::Array(array) => array.data[index] = value,
        _ => unreachable!("array placeholder replaced with non-array data"),
    }
}

/// Row-major strides: `strides[d]` is the flat distance between adjacent
/// indices along dimension `d`.
pub(crate) fn stride_table(dims: &[usize]) -> Dims {
    let mut strides: Dims = Dims::from_elem(1, dims.len());
    for d in (0..dims.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * dims[d + 1];
    }
    strides
}

/// Flat offset of a coordinate under a stride table.
pub(crate) fn linear_offset(coordinate: &[usize], strides: &[usize]) -> usize {
    coordinate.iter().zip(strides.iter()).map(|(c, s)| c * s).sum()
}

/// Advances a coordinate odometer-style. Returns `false` after the last
/// cell.
pub(crate) fn advance(coordinate: &mut [usize], dims: &[usize]) -> bool {
    for d in (0..dims.len()).rev() {
        coordinate[d] += 1;
        if coordinate[d] < dims[d] {
            return true;
        }
        coordinate[d] = 0;
    }
    false
}
