//! Bounded worker pool for download tasks.
//!
//! Each task runs on its own Tokio task and holds a semaphore permit while it
//! works. Permits are released when the task finishes (RAII).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// Minimum allowed pool size.
const MIN_POOL_SIZE: usize = 1;

/// Maximum allowed pool size.
const MAX_POOL_SIZE: usize = 100;

/// Default number of parallel downloads.
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 10;

/// Error type for worker pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Invalid pool size provided.
    #[error("invalid pool size {value}: must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}")]
    InvalidSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The pool was shut down before the task got a permit.
    #[error("worker pool is shut down")]
    ShutDown,
}

/// A fixed-size pool of download workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool that runs at most `size` tasks at once.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSize`] if `size` is outside 1..=100.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size) {
            return Err(PoolError::InvalidSize { value: size });
        }
        debug!(size, "creating worker pool");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle workers.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free worker and returns its permit.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] once the pool is closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::ShutDown)
    }

    /// Spawns `task`; it starts once a worker is free.
    ///
    /// The handle resolves to `Err(PoolError::ShutDown)` if the pool closes
    /// while the task is still queued.
    pub fn spawn<F, T>(&self, task: F) -> JoinHandle<Result<T, PoolError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.clone();
        tokio::spawn(async move {
            let _permit = pool.acquire().await?;
            Ok(task.await)
        })
    }

    /// Closes the pool. Running tasks finish; queued tasks fail with [`PoolError::ShutDown`].
    pub fn shutdown(&self) {
        debug!(size = self.size, "shutting down worker pool");
        self.semaphore.close();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.semaphore.is_closed()
    }
}
