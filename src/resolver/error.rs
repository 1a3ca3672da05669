//! Error types for resolution.

use thiserror::Error;

use crate::download::ProbeError;

/// Errors that can occur while resolving a location to a cached file or a candidate.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A version range was requested and no cached version satisfies it.
    #[error(
        "version range '{versions}' for '{location}' cannot be resolved against the server\n  Suggestion: request an exact version id"
    )]
    RangeUnsupported {
        /// The requested location.
        location: String,
        /// The requested version string.
        versions: String,
    },

    /// No candidate could be probed successfully.
    #[error("no reachable candidate for '{location}': {source}")]
    Probe {
        /// The requested location.
        location: String,
        /// The prober failure.
        #[source]
        source: ProbeError,
    },
}

impl ResolveError {
    /// Creates a `RangeUnsupported` error.
    #[must_use]
    pub fn range_unsupported(location: impl Into<String>, versions: impl Into<String>) -> Self {
        Self::RangeUnsupported {
            location: location.into(),
            versions: versions.into(),
        }
    }

    /// Creates a `Probe` error.
    #[must_use]
    pub fn probe(location: impl Into<String>, source: ProbeError) -> Self {
        Self::Probe {
            location: location.into(),
            source,
        }
    }
}
