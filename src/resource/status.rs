//! Lifecycle states of a tracked resource.

use std::fmt;

/// Where a resource is in its lifecycle.
///
/// `Incomplete` moves to exactly one terminal state. A resource in `Error`
/// is not retried by later waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceStatus {
    #[default]
    Incomplete,
    Downloaded,
    Error,
}

impl ResourceStatus {
    /// True for both terminal states.
    #[must_use]
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Downloaded | Self::Error)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Incomplete => "incomplete",
            Self::Downloaded => "downloaded",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}
