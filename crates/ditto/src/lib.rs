#![doc = include_str!("../../../README.md")]

mod array;
mod context;
mod copier;
mod engine;
mod error;
mod heap;
mod policy;
mod resource;
mod tracer;
pub mod types;
mod value;

pub use crate::{
    context::{ContextPool, CopyContext},
    engine::{CopyOptions, DeepCopier},
    error::{CopyError, CopyResult},
    heap::{ArrayData, Heap, HeapData, HeapId, HeapStats, ObjectData},
    policy::Policy,
    resource::{
        DEFAULT_MAX_COPY_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
    tracer::{CopyTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{BuiltinType, Decimal, FieldDescriptor, StructDef, TypeDescriptor, TypeId, TypeKind, TypeRegistry, Version},
    value::Value,
};
