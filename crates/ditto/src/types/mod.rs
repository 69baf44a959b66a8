//! Type model: descriptors, the registry, and well-known value payloads.

pub mod decimal;
pub mod descriptor;
pub mod registry;
pub mod version;

pub use decimal::Decimal;
pub use descriptor::{CtorFn, FieldDescriptor, StructDef, TypeDescriptor, TypeId, TypeKind};
pub use registry::{BuiltinType, TypeRegistry};
pub use version::Version;
