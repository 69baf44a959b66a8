//! Four-part version tuple, another member of the immutable seed set.

use std::fmt;

/// Immutable `major.minor.patch.revision` version tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub revision: u32,
}

impl Version {
    /// Creates a version from its four components.
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{major}.{minor}.{patch}.{revision}",
            major = self.major,
            minor = self.minor,
            patch = self.patch,
            revision = self.revision
        )
    }
}
