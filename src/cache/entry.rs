//! Cache entry metadata and its persistence contract.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::error::CacheError;
use super::lock::EntryLock;
use crate::version::VersionId;

/// Suffix of the JSON metadata file stored next to each cache file.
pub const INFO_SUFFIX: &str = ".info";

/// Suffix of the lock file stored next to each cache file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Persisted metadata for one cache slot.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Remote `Last-Modified` observed at the last fetch.
    pub last_modified: Option<u64>,
    /// Local wall-clock time of the last fetch.
    pub last_updated: Option<u64>,
    /// Content length reported by (or received from) the server.
    pub remote_content_length: Option<u64>,
    /// Length of the transfer before decompression; set only for packed transfers.
    pub original_content_length: Option<u64>,
    /// Whether the stored file was unpacked from a compressed transfer.
    #[serde(default)]
    pub packed: bool,
}

/// Handle to one cache slot: `(location, version)` → file + metadata + lock.
///
/// Setters change the in-memory metadata only; [`CacheEntry::store`]
/// persists it and refuses to do so unless the calling thread holds the
/// entry lock.
#[derive(Debug)]
pub struct CacheEntry {
    location: Url,
    version: Option<VersionId>,
    cache_file: PathBuf,
    info_file: PathBuf,
    info: Mutex<EntryInfo>,
    lock: Arc<EntryLock>,
}

impl CacheEntry {
    /// Opens the entry for `cache_file`, loading any stored metadata.
    #[must_use]
    pub fn open(
        location: Url,
        version: Option<VersionId>,
        cache_file: PathBuf,
        lock: Arc<EntryLock>,
    ) -> Self {
        let info_file = sibling(&cache_file, INFO_SUFFIX);
        let info = read_info(&info_file);
        Self {
            location,
            version,
            cache_file,
            info_file,
            info: Mutex::new(info),
            lock,
        }
    }

    #[must_use]
    pub fn location(&self) -> &Url {
        &self.location
    }

    #[must_use]
    pub fn version(&self) -> Option<&VersionId> {
        self.version.as_ref()
    }

    /// Path of the cached artifact.
    #[must_use]
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Path of the metadata file.
    #[must_use]
    pub fn info_file(&self) -> &Path {
        &self.info_file
    }

    /// Snapshot of the in-memory metadata.
    #[must_use]
    pub fn info(&self) -> EntryInfo {
        self.info_guard().clone()
    }

    pub fn set_last_modified(&self, millis: u64) {
        self.info_guard().last_modified = Some(millis);
    }

    pub fn set_last_updated(&self, millis: u64) {
        self.info_guard().last_updated = Some(millis);
    }

    pub fn set_remote_content_length(&self, length: u64) {
        self.info_guard().remote_content_length = Some(length);
    }

    pub fn set_original_content_length(&self, length: u64) {
        self.info_guard().original_content_length = Some(length);
    }

    pub fn set_packed(&self, packed: bool) {
        self.info_guard().packed = packed;
    }

    /// Replaces the in-memory metadata wholesale.
    pub fn set_info(&self, info: EntryInfo) {
        *self.info_guard() = info;
    }

    /// Re-reads metadata from disk, discarding unsaved changes.
    pub fn reload(&self) {
        *self.info_guard() = read_info(&self.info_file);
    }

    /// Returns true if the cached file is complete according to the recorded lengths.
    ///
    /// The file must exist, and either its length equals the recorded remote
    /// length, or (for packed transfers) the recorded original length equals
    /// the recorded remote length. Any mismatch means "not cached".
    #[must_use]
    pub fn is_cached(&self) -> bool {
        let Ok(metadata) = fs::metadata(&self.cache_file) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        let info = self.info_guard();
        let Some(remote) = info.remote_content_length else {
            return false;
        };
        if metadata.len() == remote {
            return true;
        }
        info.original_content_length == Some(remote)
    }

    /// Returns true if the entry is cached and was fetched with exactly this
    /// remote timestamp.
    #[must_use]
    pub fn is_current(&self, last_modified: u64) -> bool {
        self.is_cached() && self.info_guard().last_modified == Some(last_modified)
    }

    /// Blocks until the calling thread holds the entry lock.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] if the lock file cannot be locked.
    pub fn lock(&self) -> Result<(), CacheError> {
        self.lock.lock()
    }

    /// Tries to take the entry lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] on I/O failures other than contention.
    pub fn try_lock(&self) -> Result<bool, CacheError> {
        self.lock.try_lock()
    }

    /// Releases one hold of the entry lock.
    pub fn unlock(&self) -> bool {
        self.lock.unlock()
    }

    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock.is_held_by_current_thread()
    }

    /// Persists the metadata.
    ///
    /// Returns false without writing anything if the calling thread does not
    /// hold the entry lock, or if the write fails.
    pub fn store(&self) -> bool {
        if !self.lock.is_held_by_current_thread() {
            debug!(path = %self.cache_file.display(), "refusing to store entry without lock");
            return false;
        }
        let info = self.info();
        match write_info(&self.info_file, &info) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.info_file.display(), error = %e, "failed to store cache entry");
                false
            }
        }
    }

    fn info_guard(&self) -> MutexGuard<'_, EntryInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn read_info(info_file: &Path) -> EntryInfo {
    match fs::read(info_file) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %info_file.display(), error = %e, "ignoring unreadable cache metadata");
            EntryInfo::default()
        }),
        Err(_) => EntryInfo::default(),
    }
}

fn write_info(info_file: &Path, info: &EntryInfo) -> Result<(), CacheError> {
    if let Some(parent) = info_file.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(info)
        .map_err(|e| CacheError::io(info_file, std::io::Error::other(e)))?;
    let staging = sibling(info_file, ".tmp");
    fs::write(&staging, json).map_err(|e| CacheError::io(&staging, e))?;
    fs::rename(&staging, info_file).map_err(|e| CacheError::io(info_file, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Barrier;

    use tempfile::TempDir;

    use super::*;

    fn entry_with_file(temp_dir: &TempDir, contents: Option<&str>) -> CacheEntry {
        let cache_file = temp_dir.path().join("foo.jar");
        if let Some(contents) = contents {
            fs::write(&cache_file, contents).unwrap();
        }
        CacheEntry::open(
            Url::parse("http://example.com/foo.jar").unwrap(),
            Some(VersionId::parse("1.0").unwrap()),
            cache_file.clone(),
            Arc::new(EntryLock::new(sibling(&cache_file, LOCK_SUFFIX))),
        )
    }

    // ==================== Cached Tests ====================

    #[test]
    fn test_not_cached_when_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, None);
        entry.set_remote_content_length(3);
        assert!(!entry.is_cached());
    }

    #[test]
    fn test_not_cached_when_length_differs() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, Some("Foo"));
        entry.set_remote_content_length(10);
        assert!(!entry.is_cached());
    }

    #[test]
    fn test_cached_when_length_matches() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, Some("Foo"));
        entry.set_remote_content_length(3);
        assert!(entry.is_cached());
    }

    #[test]
    fn test_cached_when_original_length_matches_remote() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, Some("FooDECOMPRESSED"));
        entry.set_remote_content_length(5);
        entry.set_original_content_length(5);
        assert!(entry.is_cached());

        entry.set_original_content_length(6);
        assert!(!entry.is_cached());
    }

    // ==================== Current Tests ====================

    #[test]
    fn test_current_requires_exact_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, Some("Foo"));
        entry.set_remote_content_length(3);
        entry.set_last_modified(10);

        assert!(entry.is_current(10));
        assert!(!entry.is_current(100));
        assert!(!entry.is_current(5));
    }

    // ==================== Store Tests ====================

    #[test]
    fn test_store_fails_without_lock() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, None);
        entry.set_last_modified(10);
        assert!(!entry.store());
        assert!(!entry.info_file().exists());
    }

    #[test]
    fn test_store_works_with_lock_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, Some("Foo"));
        entry.set_last_modified(10);
        entry.set_remote_content_length(3);

        entry.lock().unwrap();
        assert!(entry.store());
        entry.unlock();

        let reopened = entry_with_file(&temp_dir, None);
        assert_eq!(reopened.info().last_modified, Some(10));
        assert!(reopened.is_cached());
    }

    #[test]
    fn test_racing_writers_store_exactly_once() {
        const WRITERS: usize = 100;
        let temp_dir = TempDir::new().unwrap();
        let entry = Arc::new(entry_with_file(&temp_dir, Some("Foo")));
        let attempted = Arc::new(Barrier::new(WRITERS));

        let writers: Vec<_> = (0..WRITERS)
            .map(|i| {
                let entry = Arc::clone(&entry);
                let attempted = Arc::clone(&attempted);
                std::thread::spawn(move || {
                    let held = entry.try_lock().unwrap();
                    let stored = held && {
                        entry.set_last_modified(i as u64);
                        entry.store()
                    };
                    // Nobody releases until every writer has tried.
                    attempted.wait();
                    if held {
                        entry.unlock();
                    }
                    stored
                })
            })
            .collect();
        let stored = writers
            .into_iter()
            .map(|writer| writer.join().unwrap())
            .filter(|stored| *stored)
            .count();

        assert_eq!(stored, 1);
        assert!(entry.info_file().exists());
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let temp_dir = TempDir::new().unwrap();
        let entry = entry_with_file(&temp_dir, None);
        entry.set_last_modified(42);
        entry.reload();
        assert_eq!(entry.info().last_modified, None);
    }

    #[test]
    fn test_readers_not_blocked_by_writer() {
        let temp_dir = TempDir::new().unwrap();
        let entry = Arc::new(entry_with_file(&temp_dir, Some("Foo")));
        let locked = Arc::new(Barrier::new(2));
        let read_done = Arc::new(Barrier::new(2));

        let writer = {
            let entry = Arc::clone(&entry);
            let locked = Arc::clone(&locked);
            let read_done = Arc::clone(&read_done);
            std::thread::spawn(move || {
                entry.lock().unwrap();
                entry.set_last_modified(10);
                let stored = entry.store();
                locked.wait();
                read_done.wait();
                entry.unlock();
                stored
            })
        };

        locked.wait();
        // The writer still holds the lock here.
        assert_eq!(entry.info().last_modified, Some(10));
        let _ = entry.is_cached();
        read_done.wait();

        assert!(writer.join().unwrap());
    }
}
