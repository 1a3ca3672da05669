//! Probing, fetching and retrying remote artifacts.
//!
//! This module owns everything that talks to the network on behalf of a
//! resource: the reqwest-backed [`HttpClient`], the [`Transport`] seam it
//! implements, candidate probing, the retry policy, and the
//! [`ResourceDownloader`] that commits transfers to the cache.
//!
//! # Features
//!
//! - HEAD probes with a GET fallback for servers that reject HEAD
//! - Parallel probing with priority-ordered winner selection
//! - Streaming transfers (memory-efficient for large artifacts)
//! - Transparent unpacking of `.pack.gz` candidates
//! - Exponential backoff on transient failures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use resource_cache::cache::{CacheStore, UpdatePolicy};
//! use resource_cache::download::{HttpClient, ResourceDownloader, RetryPolicy};
//! use resource_cache::resolver::DownloadOptions;
//! use resource_cache::resource::{Resource, ResourceKey};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = ResourceDownloader::new(
//!     CacheStore::new("/tmp/rescache"),
//!     Arc::new(HttpClient::new()),
//!     RetryPolicy::default(),
//! );
//! let key = ResourceKey::new(&Url::parse("https://example.com/app.jar")?, None);
//! let resource = Resource::new(key, DownloadOptions::NONE, UpdatePolicy::Always);
//! downloader.download(&resource).await?;
//! println!("cached at {:?}", resource.local_file());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod downloader;
mod error;
mod pool;
mod probe;
mod prober;
mod retry;
mod transport;

pub use client::HttpClient;
pub use constants::{CONNECT_TIMEOUT_SECS, PACK_SUFFIX, READ_TIMEOUT_SECS, VERSION_ID_HEADER};
pub use downloader::ResourceDownloader;
pub use error::DownloadError;
pub use pool::{DEFAULT_PARALLEL_DOWNLOADS, PoolError, WorkerPool};
pub use probe::{ProbeMethod, ProbeResult, is_packed_url, probe_candidate};
pub use prober::{FAILURE_SEPARATOR, PrioritizedProber, ProbeError};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
};
pub use transport::{BodyStream, FetchResponse, Transport};

// Note: no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
