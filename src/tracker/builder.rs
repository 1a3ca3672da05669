//! Builder for [`ResourceTracker`].

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::cache::{CacheStore, UpdatePolicy};
use crate::config::CacheConfig;
use crate::download::{HttpClient, ResourceDownloader, RetryPolicy, Transport, WorkerPool};
use crate::resolver::DownloadOptions;
use crate::resource::ResourceRegistry;

use super::error::TrackerError;
use super::resource_tracker::ResourceTracker;

/// Size of the pool speculative downloads run on.
pub const PREFETCH_POOL_SIZE: usize = 1;

/// Configures a [`ResourceTracker`].
///
/// Defaults: no prefetch, [`DownloadOptions::NONE`], the config's update
/// policy, the process-wide [`ResourceRegistry`], an [`HttpClient`] with
/// the config's timeouts, and the runtime `build` is called from.
#[derive(Debug, Default)]
pub struct ResourceTrackerBuilder {
    config: CacheConfig,
    prefetch: bool,
    options: DownloadOptions,
    policy: Option<UpdatePolicy>,
    registry: Option<Arc<ResourceRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Option<RetryPolicy>,
    runtime: Option<Handle>,
}

impl ResourceTrackerBuilder {
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Start downloads in the background as soon as resources are registered.
    #[must_use]
    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    #[must_use]
    pub fn download_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<ResourceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the retry policy derived from the config's `max_attempts`.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Runtime that downloads are spawned on.
    ///
    /// Lets a tracker built on one thread be registered against from threads
    /// that are not inside a runtime.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the tracker.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::Pool`] if `parallel_downloads` is outside 1..=100
    /// - [`TrackerError::NoRuntime`] if no runtime was given and `build` is
    ///   not called from within one
    pub fn build(self) -> Result<ResourceTracker, TrackerError> {
        let main_pool = WorkerPool::new(self.config.parallel_downloads)?;
        let prefetch_pool = WorkerPool::new(PREFETCH_POOL_SIZE)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| TrackerError::NoRuntime)?,
        };
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(HttpClient::new_with_timeouts(
                self.config.connect_timeout_secs,
                self.config.read_timeout_secs,
            ))
        });
        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| RetryPolicy::with_max_attempts(self.config.max_attempts));
        let downloader = ResourceDownloader::new(
            CacheStore::new(&self.config.cache_dir),
            transport,
            retry_policy,
        );

        Ok(ResourceTracker::from_parts(
            downloader,
            self.registry.unwrap_or_else(ResourceRegistry::global),
            runtime,
            main_pool,
            prefetch_pool,
            self.prefetch,
            self.options,
            self.policy.unwrap_or(self.config.update_policy),
        ))
    }
}
