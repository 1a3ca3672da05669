//! Tracked resources: identity, lifecycle, and progress.
//!
//! - [`ResourceKey`] - normalized `(location, version)` identity
//! - [`Resource`] - shared record with atomic progress counters and the
//!   single in-flight download handle
//! - [`ResourceRegistry`] - weak identity map, process-wide by default
//! - [`Progress`] / [`ProgressGroup`] - events and aggregate percentages

mod key;
mod progress;
mod record;
mod registry;
mod status;

pub use key::{ResourceKey, normalize_location};
pub use progress::{Progress, ProgressGroup};
pub use record::{DownloadFailure, DownloadHandle, Resource, UNKNOWN_SIZE, share};
pub use registry::ResourceRegistry;
pub use status::ResourceStatus;
