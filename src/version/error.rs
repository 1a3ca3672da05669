//! Error types for version parsing.

use thiserror::Error;

/// Errors produced when parsing version ids, ranges, or version strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The input was empty or only whitespace.
    #[error("version must not be empty")]
    Empty,

    /// The input is not a valid exact version id.
    #[error("'{input}' is not a valid version id: {reason}")]
    InvalidId {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The input is not a valid version range.
    #[error("'{input}' is not a valid version range: {reason}")]
    InvalidRange {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl VersionError {
    pub(crate) fn invalid_id(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidId {
            input: input.into(),
            reason,
        }
    }

    pub(crate) fn invalid_range(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidRange {
            input: input.into(),
            reason,
        }
    }
}
