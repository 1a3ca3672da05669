//! Location resolution: cache short-circuit, candidate URLs, and probing.
//!
//! # Architecture
//!
//! - [`build_candidates`] - the ordered list of URLs an artifact may live at
//! - [`DownloadOptions`] - which naming conventions (packed, versioned) to try
//! - [`Resolver`] - decides between the cached copy and the best candidate
//! - [`Resolution`] - the outcome: `Cached` or `Fetch`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use resource_cache::cache::{CacheStore, UpdatePolicy};
//! use resource_cache::download::{HttpClient, PrioritizedProber};
//! use resource_cache::resolver::{DownloadOptions, Resolution, Resolver};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::new(
//!     CacheStore::new("/tmp/rescache"),
//!     Arc::new(HttpClient::new()),
//!     PrioritizedProber::default(),
//! );
//! let location = Url::parse("https://example.com/app.jar")?;
//! match resolver
//!     .resolve(&location, None, DownloadOptions::NONE, UpdatePolicy::Always)
//!     .await?
//! {
//!     Resolution::Cached { local_file, .. } => println!("cached: {}", local_file.display()),
//!     Resolution::Fetch { probe, .. } => println!("fetch: {}", probe.url),
//! }
//! # Ok(())
//! # }
//! ```

mod candidates;
mod error;
mod resolve;

pub use candidates::{DownloadOptions, VERSION_ID_PARAM, build_candidates};
pub use error::ResolveError;
pub use resolve::{Resolution, Resolver};
