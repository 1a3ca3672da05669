//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so that a failure
//! surfaced through the tracker can be traced back to a concrete candidate.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::resolver::ResolveError;

/// Errors that can occur while probing or transferring an artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while staging or reading a file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Fewer bytes arrived than the server advertised.
    #[error("integrity check failed for {url}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Integrity {
        /// The URL whose body was truncated.
        url: String,
        /// Advertised size in bytes.
        expected_bytes: u64,
        /// Received size in bytes.
        actual_bytes: u64,
    },

    /// A packed transfer could not be expanded.
    #[error("failed to unpack {url}: {source}")]
    Decompression {
        /// The packed candidate URL.
        url: String,
        /// The underlying decoder error.
        #[source]
        source: std::io::Error,
    },

    /// The location could not be resolved to a reachable candidate.
    #[error("could not resolve {url}: {source}")]
    Resolve {
        /// The requested location.
        url: String,
        /// Why resolution failed.
        #[source]
        source: ResolveError,
    },

    /// The downloaded artifact could not be committed to the cache.
    #[error("could not cache {url}: {source}")]
    Cache {
        /// The requested location.
        url: String,
        /// The underlying cache error.
        #[source]
        source: CacheError,
    },

    /// A local `file:` location does not exist.
    #[error("local file not found: {path}")]
    MissingLocalFile {
        /// The missing path.
        path: PathBuf,
    },

    /// The background task driving the download panicked or was cancelled.
    #[error("download task for {url} did not complete: {reason}")]
    TaskFailed {
        /// The requested location.
        url: String,
        /// Join error text.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(url: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            url: url.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a decompression error.
    pub fn decompression(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Decompression {
            url: url.into(),
            source,
        }
    }

    /// Creates a resolution error.
    pub fn resolve(url: impl Into<String>, source: ResolveError) -> Self {
        Self::Resolve {
            url: url.into(),
            source,
        }
    }

    /// Creates a cache commit error.
    pub fn cache(url: impl Into<String>, source: CacheError) -> Self {
        Self::Cache {
            url: url.into(),
            source,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>` impls: every variant
// needs a url or path the source error does not carry. Use the constructors.
