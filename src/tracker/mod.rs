//! The public entry point: track resources and wait for them to be cached.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use resource_cache::config::CacheConfig;
//! use resource_cache::tracker::ResourceTracker;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = ResourceTracker::builder()
//!     .config(CacheConfig::default())
//!     .prefetch(true)
//!     .build()?;
//! let location = Url::parse("https://example.com/lib/app.jar")?;
//! tracker.register(&location, None)?;
//!
//! if tracker.await_all(&[location.clone()], Some(Duration::from_secs(30))).await? {
//!     println!("{:?}", tracker.cache_file(&location).await?);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod resource_tracker;

pub use builder::{PREFETCH_POOL_SIZE, ResourceTrackerBuilder};
pub use error::TrackerError;
pub use resource_tracker::ResourceTracker;
