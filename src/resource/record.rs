//! The shared record for one `(location, version)` artifact.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{Notify, watch};
use tracing::debug;
use url::Url;

use super::key::ResourceKey;
use super::progress::Progress;
use super::status::ResourceStatus;
use crate::cache::UpdatePolicy;
use crate::download::DownloadError;
use crate::resolver::DownloadOptions;
use crate::version::VersionString;

/// Size value meaning "not known yet".
pub const UNKNOWN_SIZE: i64 = -1;

/// Failure shared by every waiter of one download.
pub type DownloadFailure = Arc<DownloadError>;

/// Cloneable handle on the single in-flight download of a resource.
pub type DownloadHandle = Shared<BoxFuture<'static, Result<(), DownloadFailure>>>;

/// A tracked artifact.
///
/// Always handled through `Arc<Resource>`; the registry hands out the same
/// instance to every caller asking for the same identity. Counters are
/// atomics so progress can be read without locking.
pub struct Resource {
    key: ResourceKey,
    options: DownloadOptions,
    policy: UpdatePolicy,
    status: Mutex<ResourceStatus>,
    size: AtomicI64,
    transferred: AtomicU64,
    local_file: Mutex<Option<PathBuf>>,
    in_flight: Mutex<Option<DownloadHandle>>,
    progress: watch::Sender<Progress>,
    prefetching: AtomicBool,
    promote: Notify,
}

impl Resource {
    /// Creates a fresh, `Incomplete` resource.
    #[must_use]
    pub fn new(key: ResourceKey, options: DownloadOptions, policy: UpdatePolicy) -> Arc<Self> {
        let (progress, _) = watch::channel(Progress::default());
        Arc::new(Self {
            key,
            options,
            policy,
            status: Mutex::new(ResourceStatus::Incomplete),
            size: AtomicI64::new(UNKNOWN_SIZE),
            transferred: AtomicU64::new(0),
            local_file: Mutex::new(None),
            in_flight: Mutex::new(None),
            progress,
            prefetching: AtomicBool::new(false),
            promote: Notify::new(),
        })
    }

    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Normalized location.
    #[must_use]
    pub fn location(&self) -> &Url {
        self.key.location()
    }

    /// Requested version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&VersionString> {
        self.key.version()
    }

    #[must_use]
    pub fn options(&self) -> DownloadOptions {
        self.options
    }

    #[must_use]
    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        *lock(&self.status)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    /// Moves to `status` and publishes it. Terminal states publish `done = true`.
    pub fn set_status(&self, status: ResourceStatus) {
        *lock(&self.status) = status;
        debug!(location = %self.location(), %status, "resource status changed");
        self.publish();
    }

    /// Total size in bytes, or [`UNKNOWN_SIZE`].
    #[must_use]
    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn set_size(&self, size: i64) {
        self.size.store(size, Ordering::Release);
        self.publish();
    }

    /// Bytes received so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    pub fn add_transferred(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::AcqRel);
        self.publish();
    }

    pub fn set_transferred(&self, bytes: u64) {
        self.transferred.store(bytes, Ordering::Release);
        self.publish();
    }

    /// Local copy: the cache file, or the file itself for `file:` locations.
    #[must_use]
    pub fn local_file(&self) -> Option<PathBuf> {
        lock(&self.local_file).clone()
    }

    pub fn set_local_file(&self, path: Option<PathBuf>) {
        *lock(&self.local_file) = path;
    }

    /// Current progress snapshot.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            transferred: self.transferred(),
            size: self.size(),
            status: self.status(),
            done: self.is_complete(),
        }
    }

    /// Subscribes to progress events. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Returns the in-flight handle, creating it with `start` if there is none.
    ///
    /// The check and the insertion happen under one lock, so at most one
    /// download is ever started per resource. The second value is true when
    /// `start` ran.
    pub fn attach_or_start(&self, start: impl FnOnce() -> DownloadHandle) -> (DownloadHandle, bool) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(handle) = in_flight.as_ref() {
            return (handle.clone(), false);
        }
        let handle = start();
        *in_flight = Some(handle.clone());
        (handle, true)
    }

    /// The in-flight (or finished) download handle, if a download was ever started.
    #[must_use]
    pub fn download_handle(&self) -> Option<DownloadHandle> {
        lock(&self.in_flight).clone()
    }

    /// True while a started download has not resolved yet.
    #[must_use]
    pub fn is_being_processed(&self) -> bool {
        lock(&self.in_flight)
            .as_ref()
            .is_some_and(|handle| handle.peek().is_none())
    }

    /// Marks whether the current download was started speculatively.
    pub fn set_prefetching(&self, prefetching: bool) {
        self.prefetching.store(prefetching, Ordering::Release);
    }

    #[must_use]
    pub fn is_prefetching(&self) -> bool {
        self.prefetching.load(Ordering::Acquire)
    }

    /// Asks a queued prefetch of this resource to move to the main pool.
    pub fn promote(&self) {
        if self.is_prefetching() {
            debug!(location = %self.location(), "promoting prefetch");
            self.promote.notify_one();
        }
    }

    /// Resolves once [`Resource::promote`] is called.
    pub async fn promoted(&self) {
        self.promote.notified().await;
    }

    fn publish(&self) {
        let snapshot = self.progress();
        self.progress.send_replace(snapshot);
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("location", &self.location().as_str())
            .field("version", &self.version().map(VersionString::as_str))
            .field("status", &self.status())
            .field("size", &self.size())
            .field("transferred", &self.transferred())
            .finish_non_exhaustive()
    }
}

/// Wraps a future into a [`DownloadHandle`].
pub fn share<F>(future: F) -> DownloadHandle
where
    F: std::future::Future<Output = Result<(), DownloadFailure>> + Send + 'static,
{
    future.boxed().shared()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
