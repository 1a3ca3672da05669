//! Per-entry writer lock, exclusive across threads and processes.
//!
//! In-process exclusion is a reentrant owner/hold-count pair guarded by a
//! `Mutex` + `Condvar`. Cross-process exclusion is an advisory `fs2` lock on
//! a sibling `<file>.lock`, taken with the first hold and released with the
//! last. Readers never touch this lock.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use fs2::FileExt;
use tracing::{debug, trace};

use super::error::CacheError;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
    file: Option<File>,
}

/// Reentrant writer lock for one cache entry.
#[derive(Debug)]
pub struct EntryLock {
    lock_path: PathBuf,
    state: Mutex<LockState>,
    released: Condvar,
}

impl EntryLock {
    /// Creates a lock backed by `lock_path`. The file is created on first use.
    #[must_use]
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Path of the backing lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Blocks until the calling thread holds the lock.
    ///
    /// Reentrant: a thread that already holds the lock only bumps the hold count.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] if the lock file cannot be created or locked.
    pub fn lock(&self) -> Result<(), CacheError> {
        let me = thread::current().id();
        let mut state = self.state_guard();
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.holds += 1;
                    return Ok(());
                }
                None => break,
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        state.owner = Some(me);
        state.holds = 1;
        drop(state);

        // Another process may hold the file lock; wait for it without
        // blocking in-process try_lock callers.
        let acquired = self
            .open_lock_file()
            .and_then(|file| file.lock_exclusive().map(|()| file));

        let mut state = self.state_guard();
        match acquired {
            Ok(file) => {
                trace!(path = %self.lock_path.display(), "entry lock acquired");
                state.file = Some(file);
                Ok(())
            }
            Err(e) => {
                state.owner = None;
                state.holds = 0;
                drop(state);
                self.released.notify_all();
                Err(CacheError::lock(&self.lock_path, e))
            }
        }
    }

    /// Tries to take the lock without blocking.
    ///
    /// Returns `Ok(false)` if another thread or process holds it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] on I/O failures other than contention.
    pub fn try_lock(&self) -> Result<bool, CacheError> {
        let me = thread::current().id();
        let mut state = self.state_guard();
        match state.owner {
            Some(owner) if owner == me => {
                state.holds += 1;
                return Ok(true);
            }
            Some(_) => return Ok(false),
            None => {}
        }

        let file = self
            .open_lock_file()
            .map_err(|e| CacheError::lock(&self.lock_path, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                state.owner = Some(me);
                state.holds = 1;
                state.file = Some(file);
                trace!(path = %self.lock_path.display(), "entry lock acquired (try)");
                Ok(true)
            }
            Err(e) if is_contended(&e) => {
                debug!(path = %self.lock_path.display(), "entry lock held by another process");
                Ok(false)
            }
            Err(e) => Err(CacheError::lock(&self.lock_path, e)),
        }
    }

    /// Releases one hold. Returns false if the calling thread did not hold the lock.
    pub fn unlock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state_guard();
        if state.owner != Some(me) {
            return false;
        }
        state.holds -= 1;
        if state.holds > 0 {
            return true;
        }
        if let Some(file) = state.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                debug!(path = %self.lock_path.display(), error = %e, "failed to release lock file");
            }
        }
        state.owner = None;
        drop(state);
        self.released.notify_one();
        true
    }

    /// Returns true if some thread holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state_guard().owner.is_some()
    }

    /// Returns true if the calling thread holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state_guard().owner == Some(thread::current().id())
    }

    fn state_guard(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_lock_file(&self) -> io::Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
