//! Error types for the cache module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by cache storage and locking.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File system error reading or writing cache content.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The entry lock file could not be created or locked.
    #[error("failed to lock cache entry {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The entry metadata could not be written.
    #[error("failed to record metadata for {path}")]
    StoreFailed {
        /// The cache file whose metadata was not stored.
        path: PathBuf,
    },

    /// The location uses a scheme the cache does not hold (anything but http and https).
    #[error("location is not cacheable: {url}")]
    NotCacheable {
        /// The rejected location.
        url: String,
    },
}

impl CacheError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a lock error.
    pub fn lock(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }
}
