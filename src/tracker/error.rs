//! Error types for the tracker.

use thiserror::Error;

use crate::download::PoolError;

/// Errors returned by [`ResourceTracker`](super::ResourceTracker) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The location was never registered with this tracker.
    #[error("resource is not tracked: {location}")]
    NotTracked {
        /// The requested location.
        location: String,
    },

    /// The location is already tracked with another version.
    #[error(
        "{location} is already tracked with version {}, cannot track version {}",
        display_version(.existing),
        display_version(.requested)
    )]
    ConflictingVersion {
        /// The tracked location.
        location: String,
        /// Version already tracked.
        existing: Option<String>,
        /// Version asked for.
        requested: Option<String>,
    },

    /// `await_all` was given a zero timeout.
    #[error("timeout must be positive")]
    TimeoutMustBePositive,

    /// The tracker was shut down and cannot start new downloads.
    #[error("tracker is shut down")]
    ShutDown,

    /// The tracker was built outside a tokio runtime and given no handle.
    #[error("no tokio runtime available to run downloads on")]
    NoRuntime,

    /// The worker pools could not be created.
    #[error("invalid pool configuration: {0}")]
    Pool(#[from] PoolError),
}

impl TrackerError {
    /// Creates a not-tracked error.
    pub fn not_tracked(location: impl Into<String>) -> Self {
        Self::NotTracked {
            location: location.into(),
        }
    }
}

fn display_version(version: &Option<String>) -> &str {
    version.as_deref().unwrap_or("<none>")
}
