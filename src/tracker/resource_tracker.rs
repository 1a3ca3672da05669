use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use url::Url;

use super::builder::ResourceTrackerBuilder;
use super::error::TrackerError;
use crate::cache::UpdatePolicy;
use crate::config::CacheConfig;
use crate::download::{DownloadError, PoolError, ResourceDownloader, WorkerPool};
use crate::resolver::DownloadOptions;
use crate::resource::{
    DownloadFailure, DownloadHandle, Progress, ProgressGroup, Resource, ResourceKey,
    ResourceRegistry, ResourceStatus, normalize_location, share,
};
use crate::version::VersionString;

/// Registers resources and gets them into the cache.
///
/// Each location is tracked at most once, with one version. Downloads run on
/// a bounded main pool; with prefetch enabled, registration also queues a
/// speculative download on a single-worker prefetch pool. Waiting on a
/// prefetching resource promotes it to the main pool.
#[derive(Debug)]
pub struct ResourceTracker {
    resources: Mutex<HashMap<Url, Arc<Resource>>>,
    registry: Arc<ResourceRegistry>,
    downloader: ResourceDownloader,
    runtime: Handle,
    main_pool: WorkerPool,
    prefetch_pool: WorkerPool,
    prefetch: bool,
    options: DownloadOptions,
    policy: UpdatePolicy,
}

impl ResourceTracker {
    /// Creates a tracker from `config` with builder defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Pool`] if `parallel_downloads` is out of range,
    /// or [`TrackerError::NoRuntime`] when called outside a tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self, TrackerError> {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn builder() -> ResourceTrackerBuilder {
        ResourceTrackerBuilder::default()
    }

    pub(super) fn from_parts(
        downloader: ResourceDownloader,
        registry: Arc<ResourceRegistry>,
        runtime: Handle,
        main_pool: WorkerPool,
        prefetch_pool: WorkerPool,
        prefetch: bool,
        options: DownloadOptions,
        policy: UpdatePolicy,
    ) -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
            registry,
            downloader,
            runtime,
            main_pool,
            prefetch_pool,
            prefetch,
            options,
            policy,
        }
    }

    /// Tracks `location` at `version` with the tracker's update policy.
    ///
    /// # Errors
    ///
    /// See [`ResourceTracker::register_with_policy`].
    pub fn register(
        &self,
        location: &Url,
        version: Option<&VersionString>,
    ) -> Result<Arc<Resource>, TrackerError> {
        self.register_with_policy(location, version, self.policy)
    }

    /// Tracks `location` at `version`.
    ///
    /// Registering the same identity again returns the same resource. In
    /// prefetch mode an incomplete, idle resource is queued for download.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ConflictingVersion`] if `location` is already
    /// tracked with a different version.
    pub fn register_with_policy(
        &self,
        location: &Url,
        version: Option<&VersionString>,
        policy: UpdatePolicy,
    ) -> Result<Arc<Resource>, TrackerError> {
        let key = ResourceKey::new(location, version);
        let resource = {
            let mut resources = self.resources();
            if let Some(existing) = resources.get(key.location()) {
                if existing.version() != key.version() {
                    return Err(TrackerError::ConflictingVersion {
                        location: key.location().to_string(),
                        existing: existing.version().map(ToString::to_string),
                        requested: key.version().map(ToString::to_string),
                    });
                }
                return Ok(Arc::clone(existing));
            }
            let resource = self.registry.get_or_create(&key, self.options, policy);
            resources.insert(key.location().clone(), Arc::clone(&resource));
            resource
        };
        debug!(key = %key, %policy, "tracking resource");

        if self.prefetch
            && !resource.is_complete()
            && !resource.is_being_processed()
            && !self.prefetch_pool.is_shut_down()
        {
            self.schedule(&resource, true);
        }
        Ok(resource)
    }

    /// Stops tracking `location`. Returns false if it was not tracked.
    pub fn remove(&self, location: &Url) -> bool {
        self.resources()
            .remove(&normalize_location(location))
            .is_some()
    }

    /// Waits until every location in `locations` is downloaded or failed.
    ///
    /// Idle resources are scheduled on the main pool; resources already in
    /// flight are joined, and prefetches among them promoted. Returns
    /// `Ok(false)` if `timeout` elapses first; the downloads keep running.
    /// A failed download does not fail the batch: the resource is left in
    /// [`ResourceStatus::Error`].
    ///
    /// # Errors
    ///
    /// - [`TrackerError::TimeoutMustBePositive`] for a zero timeout
    /// - [`TrackerError::NotTracked`] for an unregistered location
    /// - [`TrackerError::ShutDown`] if a download would have to start after shutdown
    #[instrument(skip(self, locations), fields(count = locations.len()))]
    pub async fn await_all(
        &self,
        locations: &[Url],
        timeout: Option<Duration>,
    ) -> Result<bool, TrackerError> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(TrackerError::TimeoutMustBePositive);
        }
        let resources = locations
            .iter()
            .map(|location| self.lookup(location))
            .collect::<Result<Vec<_>, _>>()?;

        let mut handles = Vec::with_capacity(resources.len());
        for resource in &resources {
            if resource.is_complete() {
                continue;
            }
            if resource.download_handle().is_none() && self.main_pool.is_shut_down() {
                return Err(TrackerError::ShutDown);
            }
            handles.push(self.schedule(resource, false));
        }
        if handles.is_empty() {
            return Ok(true);
        }

        let all = join_all(handles);
        match timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, all).await.is_ok() {
                    Ok(true)
                } else {
                    debug!(timeout_ms = limit.as_millis(), "wait timed out");
                    Ok(false)
                }
            }
            None => {
                all.await;
                Ok(true)
            }
        }
    }

    /// Total size in bytes, or -1 while unknown.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn total_bytes(&self, location: &Url) -> Result<i64, TrackerError> {
        Ok(self.lookup(location)?.size())
    }

    /// Bytes received so far.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn bytes_transferred(&self, location: &Url) -> Result<u64, TrackerError> {
        Ok(self.lookup(location)?.transferred())
    }

    /// True once the resource reached a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn is_complete(&self, location: &Url) -> Result<bool, TrackerError> {
        Ok(self.lookup(location)?.is_complete())
    }

    /// Status of a tracked resource.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn status(&self, location: &Url) -> Result<ResourceStatus, TrackerError> {
        Ok(self.lookup(location)?.status())
    }

    /// Waits for the resource and returns its local file.
    ///
    /// `file:` locations resolve to their own path without waiting. Returns
    /// `None` if the download failed.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceTracker::await_all`].
    pub async fn cache_file(&self, location: &Url) -> Result<Option<PathBuf>, TrackerError> {
        let resource = self.lookup(location)?;
        if resource.location().scheme() == "file" {
            return Ok(resource.location().to_file_path().ok());
        }
        self.await_all(std::slice::from_ref(location), None).await?;
        Ok(match resource.status() {
            ResourceStatus::Downloaded => resource.local_file(),
            ResourceStatus::Incomplete | ResourceStatus::Error => None,
        })
    }

    /// A `file:` URL for the cached copy, or `location` itself when there is none.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceTracker::await_all`].
    pub async fn cache_url(&self, location: &Url) -> Result<Url, TrackerError> {
        Ok(self
            .cache_file(location)
            .await?
            .and_then(|path| Url::from_file_path(path).ok())
            .unwrap_or_else(|| location.clone()))
    }

    /// Subscribes to progress events of a tracked resource.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn subscribe(&self, location: &Url) -> Result<watch::Receiver<Progress>, TrackerError> {
        Ok(self.lookup(location)?.subscribe())
    }

    /// Average completion of `locations`, 0..=100.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for an unregistered location.
    pub fn percentage(&self, locations: &[Url]) -> Result<u8, TrackerError> {
        let resources = locations
            .iter()
            .map(|location| self.lookup(location))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProgressGroup::new(resources).percentage())
    }

    /// Locations currently tracked, normalized.
    #[must_use]
    pub fn tracked(&self) -> Vec<Url> {
        self.resources().keys().cloned().collect()
    }

    /// Closes both pools. Running downloads finish; queued ones fail.
    pub fn shutdown(&self) {
        info!("shutting down resource tracker");
        self.main_pool.shutdown();
        self.prefetch_pool.shutdown();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.main_pool.is_shut_down()
    }

    fn lookup(&self, location: &Url) -> Result<Arc<Resource>, TrackerError> {
        let normalized = normalize_location(location);
        self.resources()
            .get(&normalized)
            .cloned()
            .ok_or_else(|| TrackerError::not_tracked(normalized.as_str()))
    }

    /// Returns the resource's download handle, starting the download if needed.
    fn schedule(&self, resource: &Arc<Resource>, prefetch: bool) -> DownloadHandle {
        let (handle, started) = resource.attach_or_start(|| {
            resource.set_prefetching(prefetch);
            let task = self.spawn_download(Arc::clone(resource), prefetch);
            let url = resource.location().to_string();
            share(async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(Arc::new(DownloadError::TaskFailed {
                        url,
                        reason: e.to_string(),
                    })),
                }
            })
        });
        if started {
            debug!(location = %resource.location(), prefetch, "scheduled download");
        } else if !prefetch {
            resource.promote();
        }
        handle
    }

    fn spawn_download(
        &self,
        resource: Arc<Resource>,
        prefetch: bool,
    ) -> JoinHandle<Result<(), DownloadFailure>> {
        let downloader = self.downloader.clone();
        let main_pool = self.main_pool.clone();
        let prefetch_pool = self.prefetch_pool.clone();
        self.runtime.spawn(async move {
            let permit = if prefetch {
                prefetch_slot(&resource, &prefetch_pool, &main_pool).await
            } else {
                main_pool.acquire().await
            };
            resource.set_prefetching(false);
            let _permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    resource.set_status(ResourceStatus::Error);
                    return Err(Arc::new(DownloadError::TaskFailed {
                        url: resource.location().to_string(),
                        reason: e.to_string(),
                    }));
                }
            };
            downloader.download(&resource).await
        })
    }

    fn resources(&self) -> MutexGuard<'_, HashMap<Url, Arc<Resource>>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Waits for the prefetch worker, or for a main worker once promoted.
async fn prefetch_slot(
    resource: &Resource,
    prefetch_pool: &WorkerPool,
    main_pool: &WorkerPool,
) -> Result<OwnedSemaphorePermit, PoolError> {
    tokio::select! {
        permit = prefetch_pool.acquire() => permit,
        () = resource.promoted() => {
            debug!(location = %resource.location(), "prefetch promoted to main pool");
            main_pool.acquire().await
        }
    }
}
