//! Copy failure kinds surfaced to callers.
//!
//! No error is retried and no partial result is returned: a failure aborts
//! the top-level copy, and the leased context is cleared on release so the
//! pool never observes poisoned state. The aliasing, shallow, and
//! identity-hit paths are infallible by construction.

use std::fmt;

use crate::resource::ResourceError;

/// Result alias for copy operations.
pub type CopyResult<T> = Result<T, CopyError>;

/// Error produced by a copy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyError {
    /// Attempt to copy a value of a type the engine refuses to copy,
    /// currently only by-reference roots.
    UnsupportedType {
        /// Registered name of the offending type.
        type_name: String,
    },
    /// A registered constructor failed, or produced the wrong field count.
    ConstructionFailure {
        /// Registered name of the type under construction.
        type_name: String,
        /// Constructor-supplied failure description.
        reason: String,
    },
    /// Internal invariant broken. Treated as a fatal bug and surfaced.
    InvariantViolation(String),
    /// A resource limit was exceeded by the tracker.
    Resource(ResourceError),
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType { type_name } => {
                write!(f, "cannot copy value of unsupported type '{type_name}'")
            }
            Self::ConstructionFailure { type_name, reason } => {
                write!(f, "failed to construct instance of '{type_name}': {reason}")
            }
            Self::InvariantViolation(msg) => write!(f, "copy invariant violated: {msg}"),
            Self::Resource(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for CopyError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}
