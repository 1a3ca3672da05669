//! The on-disk cache store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, info, instrument};
use url::Url;

use super::entry::{CacheEntry, EntryInfo, LOCK_SUFFIX, sibling};
use super::error::CacheError;
use super::lock::EntryLock;
use super::path::{cache_path, location_dir};
use crate::version::{VersionId, VersionString};

/// Schemes whose artifacts are copied into the cache.
const CACHEABLE_SCHEMES: [&str; 2] = ["http", "https"];

/// Lock table size at which locks nobody uses are dropped before adding another.
const LOCK_TABLE_PRUNE_AT: usize = 1024;

/// Maps `(location, version)` to cache slots and hands out their entries.
///
/// Cloning is cheap; clones share the same in-process lock table so every
/// [`CacheEntry`] for one slot synchronizes on one [`EntryLock`]. The table
/// keeps locks that are held or referenced; idle ones are pruned once it
/// reaches `LOCK_TABLE_PRUNE_AT` slots.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    locks: DashMap<PathBuf, Arc<EntryLock>>,
}

impl CacheStore {
    /// Creates a store rooted at `root`. Nothing is created on disk until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: root.into(),
                locks: DashMap::new(),
            }),
        }
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Returns true if artifacts at `location` are stored in the cache.
    #[must_use]
    pub fn is_cacheable(location: &Url) -> bool {
        CACHEABLE_SCHEMES.contains(&location.scheme())
    }

    /// Path of the cache file for `(location, version)`.
    #[must_use]
    pub fn cache_file(&self, location: &Url, version: Option<&VersionId>) -> PathBuf {
        cache_path(&self.inner.root, location, version)
    }

    /// Opens the entry for `(location, version)`.
    #[must_use]
    pub fn entry(&self, location: &Url, version: Option<&VersionId>) -> CacheEntry {
        let cache_file = self.cache_file(location, version);
        let lock = self.lock_for(&cache_file);
        CacheEntry::open(location.clone(), version.cloned(), cache_file, lock)
    }

    /// Returns true if a complete copy of `(location, version)` is cached.
    #[must_use]
    pub fn is_cached(&self, location: &Url, version: Option<&VersionId>) -> bool {
        self.entry(location, version).is_cached()
    }

    /// Blocks until the calling thread holds the lock for `(location, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] if the lock file cannot be locked.
    pub fn lock(&self, location: &Url, version: Option<&VersionId>) -> Result<(), CacheError> {
        self.lock_for(&self.cache_file(location, version)).lock()
    }

    /// Non-blocking variant of [`CacheStore::lock`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lock`] on I/O failures other than contention.
    pub fn try_lock(
        &self,
        location: &Url,
        version: Option<&VersionId>,
    ) -> Result<bool, CacheError> {
        self.lock_for(&self.cache_file(location, version)).try_lock()
    }

    /// Releases one hold of the lock for `(location, version)`.
    pub fn unlock(&self, location: &Url, version: Option<&VersionId>) -> bool {
        self.lock_for(&self.cache_file(location, version)).unlock()
    }

    /// Lists versions of `location` that have a complete cached copy.
    #[must_use]
    pub fn cached_versions(&self, location: &Url) -> Vec<VersionId> {
        let dir = location_dir(&self.inner.root, location);
        let Ok(read_dir) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut versions: Vec<VersionId> = read_dir
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                VersionId::parse(name.strip_prefix('V')?).ok()
            })
            .filter(|version| self.is_cached(location, Some(version)))
            .collect();
        versions.sort();
        versions
    }

    /// Returns the highest cached version that `versions` accepts, with its entry.
    #[must_use]
    pub fn best_cached(
        &self,
        location: &Url,
        versions: &VersionString,
    ) -> Option<(VersionId, CacheEntry)> {
        let best = self
            .cached_versions(location)
            .into_iter()
            .filter(|v| versions.contains(v))
            .max()?;
        let entry = self.entry(location, Some(&best));
        Some((best, entry))
    }

    /// Returns a fresh temporary path next to the cache file for staging a download.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the parent directory cannot be created.
    pub fn staging_file(
        &self,
        location: &Url,
        version: Option<&VersionId>,
    ) -> Result<PathBuf, CacheError> {
        let cache_file = self.cache_file(location, version);
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        let nonce: u32 = rand::thread_rng().r#gen();
        Ok(sibling(&cache_file, &format!(".part-{nonce:08x}")))
    }

    /// Moves a fully written `staged` file into the slot and records `info`.
    ///
    /// Runs lock → rename → store → unlock. Blocking; call from a blocking
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if locking, renaming or storing fails. The
    /// staged file is removed on failure.
    #[instrument(skip(self, staged, info), fields(location = %location))]
    pub fn add_to_cache(
        &self,
        location: &Url,
        version: Option<&VersionId>,
        staged: &Path,
        info: EntryInfo,
    ) -> Result<PathBuf, CacheError> {
        let entry = self.entry(location, version);
        let result = commit(&entry, staged, info);
        if result.is_err() {
            let _ = fs::remove_file(staged);
        }
        result
    }

    fn lock_for(&self, cache_file: &Path) -> Arc<EntryLock> {
        let locks = &self.inner.locks;
        if let Some(lock) = locks.get(cache_file) {
            return Arc::clone(lock.value());
        }
        if locks.len() >= LOCK_TABLE_PRUNE_AT {
            // Clones are only made under the shard lock, so a count of one
            // cannot rise while `retain` looks at it.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1 || lock.is_locked());
            debug!(remaining = locks.len(), "pruned idle entry locks");
        }
        let lock = locks
            .entry(cache_file.to_path_buf())
            .or_insert_with(|| Arc::new(EntryLock::new(sibling(cache_file, LOCK_SUFFIX))));
        Arc::clone(lock.value())
    }
}

fn commit(entry: &CacheEntry, staged: &Path, info: EntryInfo) -> Result<PathBuf, CacheError> {
    let cache_file = entry.cache_file().to_path_buf();
    entry.lock()?;
    let outcome = (|| {
        fs::rename(staged, &cache_file).map_err(|e| CacheError::io(&cache_file, e))?;
        entry.set_info(info);
        if entry.store() {
            Ok(())
        } else {
            Err(CacheError::StoreFailed {
                path: cache_file.clone(),
            })
        }
    })();
    entry.unlock();
    outcome?;
    info!(path = %cache_file.display(), "added to cache");
    debug!(info = ?entry.info(), "entry metadata");
    Ok(cache_file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn v(s: &str) -> VersionId {
        VersionId::parse(s).unwrap()
    }

    fn put(store: &CacheStore, location: &Url, version: Option<&VersionId>, body: &[u8]) {
        let staged = store.staging_file(location, version).unwrap();
        fs::write(&staged, body).unwrap();
        let info = EntryInfo {
            remote_content_length: Some(body.len() as u64),
            ..EntryInfo::default()
        };
        store.add_to_cache(location, version, &staged, info).unwrap();
    }

    #[test]
    fn test_is_cacheable() {
        assert!(CacheStore::is_cacheable(&url("http://h/a.jar")));
        assert!(CacheStore::is_cacheable(&url("https://h/a.jar")));
        assert!(!CacheStore::is_cacheable(&url("file:///tmp/a.jar")));
        assert!(!CacheStore::is_cacheable(&url("ftp://h/a.jar")));
    }

    #[test]
    fn test_lock_table_drops_idle_locks_but_keeps_held_ones() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let held = url("http://example.com/held.jar");
        store.lock(&held, None).unwrap();

        for i in 0..LOCK_TABLE_PRUNE_AT * 2 {
            let _ = store.is_cached(&url(&format!("http://example.com/{i}.jar")), None);
        }

        assert!(store.inner.locks.len() <= LOCK_TABLE_PRUNE_AT + 1);
        assert!(store.entry(&held, None).is_held_by_current_thread());
        assert!(store.unlock(&held, None));
    }

    #[test]
    fn test_add_to_cache_makes_entry_cached() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");

        assert!(!store.is_cached(&location, None));
        put(&store, &location, None, b"hello");

        assert!(store.is_cached(&location, None));
        let cached = store.cache_file(&location, None);
        assert_eq!(fs::read(&cached).unwrap(), b"hello");
        assert!(!store.entry(&location, None).is_held_by_current_thread());
    }

    #[test]
    fn test_entries_for_same_slot_share_lock() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");

        let first = store.entry(&location, None);
        let second = store.clone().entry(&location, None);
        first.lock().unwrap();
        assert!(second.is_held_by_current_thread());
        assert!(second.store());
        assert!(first.unlock());
    }

    #[test]
    fn test_store_level_lock_and_unlock() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");

        store.lock(&location, None).unwrap();
        assert!(store.entry(&location, None).store());
        assert!(store.unlock(&location, None));
        assert!(!store.entry(&location, None).store());
    }

    #[test]
    fn test_versions_have_separate_slots() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");

        put(&store, &location, Some(&v("1.0")), b"one");
        assert!(store.is_cached(&location, Some(&v("1.0"))));
        assert!(!store.is_cached(&location, Some(&v("2.0"))));
        assert!(!store.is_cached(&location, None));
    }

    #[test]
    fn test_best_cached_picks_highest_matching() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");
        put(&store, &location, Some(&v("1.0")), b"one");
        put(&store, &location, Some(&v("1.2")), b"one-two");
        put(&store, &location, Some(&v("2.0")), b"two");

        assert_eq!(store.cached_versions(&location), vec![v("1.0"), v("1.2"), v("2.0")]);

        let request = VersionString::parse("1.0+&1*").unwrap();
        let (best, entry) = store.best_cached(&location, &request).unwrap();
        assert_eq!(best, v("1.2"));
        assert!(entry.is_cached());

        let none = VersionString::parse("3.0+").unwrap();
        assert!(store.best_cached(&location, &none).is_none());
    }

    #[test]
    fn test_failed_commit_removes_staged_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let location = url("http://example.com/a.jar");
        let missing = temp_dir.path().join("does-not-exist.part");

        let result = store.add_to_cache(&location, None, &missing, EntryInfo::default());
        assert!(matches!(result, Err(CacheError::Io { .. })));
        assert!(!store.entry(&location, None).is_held_by_current_thread());
    }
}
