//! Resource Cache Library
//!
//! This library downloads remote artifacts into a versioned on-disk cache,
//! reuses cached copies while they are fresh, and lets many callers wait on
//! the same download without fetching it twice.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`tracker`] - Public entry point: register locations, await them
//! - [`resource`] - Shared resource records, status, and progress events
//! - [`resolver`] - Candidate URLs and the cache-or-fetch decision
//! - [`download`] - HTTP probing and fetching, retries, worker pools
//! - [`cache`] - On-disk layout, entry metadata, and entry locks
//! - [`version`] - Version ids, ranges, and version strings
//! - [`config`] - Runtime and file configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod download;
pub mod resolver;
pub mod resource;
pub mod tracker;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use cache::{CacheStore, UpdatePolicy};
pub use config::CacheConfig;
pub use download::{DownloadError, HttpClient, ResourceDownloader, RetryPolicy};
pub use resolver::DownloadOptions;
pub use resource::{Resource, ResourceStatus};
pub use tracker::{ResourceTracker, TrackerError};
pub use version::{VersionId, VersionString};
