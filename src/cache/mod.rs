//! On-disk artifact cache.
//!
//! # Overview
//!
//! Each `(location, version)` pair maps to one cache slot: the artifact file,
//! a JSON `.info` metadata file next to it, and a `.lock` file used to
//! serialize writers across threads and processes.
//!
//! - [`path`] - the deterministic on-disk layout
//! - [`CacheEntry`] - metadata, completeness checks, and the persistence contract
//! - [`EntryLock`] - the reentrant cross-process writer lock
//! - [`CacheStore`] - slot lookup, version scans, and committing downloads
//! - [`UpdatePolicy`] - when a cached copy must be revalidated
//!
//! # Example
//!
//! ```no_run
//! use resource_cache::cache::CacheStore;
//! use url::Url;
//!
//! let store = CacheStore::new("/tmp/rescache");
//! let location = Url::parse("http://example.com/app.jar").unwrap();
//! if store.is_cached(&location, None) {
//!     println!("{}", store.cache_file(&location, None).display());
//! }
//! ```

mod entry;
mod error;
mod lock;
pub mod path;
mod policy;
mod store;

use std::time::{SystemTime, UNIX_EPOCH};

pub use entry::{CacheEntry, EntryInfo, INFO_SUFFIX, LOCK_SUFFIX};
pub use error::CacheError;
pub use lock::EntryLock;
pub use path::cache_path;
pub use policy::{ParsePolicyError, UpdatePolicy};
pub use store::CacheStore;

/// Milliseconds since the Unix epoch; times before the epoch map to 0.
#[must_use]
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
