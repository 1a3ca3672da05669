//! Decide whether a location is served from the cache or must be fetched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, instrument, warn};
use url::Url;

use super::candidates::{DownloadOptions, build_candidates};
use super::error::ResolveError;
use crate::cache::{CacheStore, EntryInfo, UpdatePolicy};
use crate::download::{DownloadError, PrioritizedProber, ProbeResult, Transport, probe_candidate};
use crate::version::{VersionId, VersionString};

/// Outcome of resolving one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A usable copy is already cached.
    Cached {
        /// The cached file.
        local_file: PathBuf,
        /// Version slot the file lives in.
        version: Option<VersionId>,
        /// Metadata of the entry.
        info: EntryInfo,
        /// True when the server was asked and confirmed the copy is current.
        revalidated: bool,
    },
    /// The best reachable candidate must be downloaded.
    Fetch {
        /// Probe of the winning candidate.
        probe: ProbeResult,
        /// Version slot the download is stored in.
        version: Option<VersionId>,
    },
}

/// Resolves locations against the cache and the network.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: CacheStore,
    transport: Arc<dyn Transport>,
    prober: PrioritizedProber,
}

impl Resolver {
    #[must_use]
    pub fn new(store: CacheStore, transport: Arc<dyn Transport>, prober: PrioritizedProber) -> Self {
        Self {
            store,
            transport,
            prober,
        }
    }

    /// Resolves `location` at `version`.
    ///
    /// 1. An exact (or absent) version whose entry is cached and not due for
    ///    an update per `policy` is served from the cache without I/O.
    /// 2. A version range is served from the highest cached version it
    ///    contains; otherwise it fails with [`ResolveError::RangeUnsupported`].
    /// 3. All candidates are probed; the highest-priority reachable one wins.
    /// 4. If the winner reports the same `Last-Modified` as the cached entry,
    ///    the cached copy is kept (unless `policy` is [`UpdatePolicy::Force`]).
    /// 5. If no candidate is reachable, a complete cached copy is used as is.
    ///
    /// # Errors
    ///
    /// [`ResolveError::RangeUnsupported`], or [`ResolveError::Probe`] when no
    /// candidate is reachable and nothing usable is cached.
    #[instrument(skip(self, version), fields(location = %location, version = ?version.map(VersionString::as_str)))]
    pub async fn resolve(
        &self,
        location: &Url,
        version: Option<&VersionString>,
        options: DownloadOptions,
        policy: UpdatePolicy,
    ) -> Result<Resolution, ResolveError> {
        let exact = match version {
            Some(requested) => match requested.exact() {
                Some(id) => Some(id.clone()),
                None => return self.resolve_range(location, requested),
            },
            None => None,
        };

        let entry = self.store.entry(location, exact.as_ref());
        let cached = !policy.is_force() && entry.is_cached();
        if cached && !policy.should_update(&entry.info(), SystemTime::now()) {
            debug!(path = %entry.cache_file().display(), "cached copy is fresh");
            return Ok(Resolution::Cached {
                local_file: entry.cache_file().to_path_buf(),
                version: exact,
                info: entry.info(),
                revalidated: false,
            });
        }

        let candidates = build_candidates(location, version, options);
        debug!(candidates = ?candidates.iter().map(Url::as_str).collect::<Vec<_>>(), "probing candidates");
        let transport = self.transport.as_ref();
        let ops: Vec<BoxFuture<'_, Result<ProbeResult, DownloadError>>> = candidates
            .iter()
            .map(|candidate| probe_candidate(transport, candidate).boxed())
            .collect();
        let probe = match self.prober.run(ops).await {
            Ok(probe) => probe,
            Err(e) if cached => {
                warn!(
                    error = %e,
                    path = %entry.cache_file().display(),
                    "no candidate reachable, using cached copy"
                );
                return Ok(Resolution::Cached {
                    local_file: entry.cache_file().to_path_buf(),
                    version: exact,
                    info: entry.info(),
                    revalidated: false,
                });
            }
            Err(e) => return Err(ResolveError::probe(location.as_str(), e)),
        };

        let info = entry.info();
        if cached && info.last_modified == probe.last_modified_millis() {
            debug!(url = %probe.url, "server copy unchanged");
            return Ok(Resolution::Cached {
                local_file: entry.cache_file().to_path_buf(),
                version: exact,
                info,
                revalidated: true,
            });
        }

        debug!(url = %probe.url, status = probe.status, "resolved to candidate");
        Ok(Resolution::Fetch {
            probe,
            version: exact,
        })
    }

    fn resolve_range(
        &self,
        location: &Url,
        requested: &VersionString,
    ) -> Result<Resolution, ResolveError> {
        match self.store.best_cached(location, requested) {
            Some((version, entry)) => {
                debug!(version = %version, "range satisfied from cache");
                Ok(Resolution::Cached {
                    local_file: entry.cache_file().to_path_buf(),
                    info: entry.info(),
                    version: Some(version),
                    revalidated: false,
                })
            }
            None => Err(ResolveError::range_unsupported(
                location.as_str(),
                requested.as_str(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::download::{ProbeError, ProbeMethod};
    use crate::test_support::transport::{Route, ScriptedTransport};

    const LOCATION: &str = "http://h/app.jar";

    fn location() -> Url {
        Url::parse(LOCATION).unwrap()
    }

    fn seed(store: &CacheStore, version: Option<&VersionId>, body: &[u8], last_modified: Option<u64>) {
        let staged = store.staging_file(&location(), version).unwrap();
        fs::write(&staged, body).unwrap();
        let info = EntryInfo {
            remote_content_length: Some(body.len() as u64),
            last_modified,
            last_updated: Some(crate::cache::unix_millis(SystemTime::now())),
            ..EntryInfo::default()
        };
        store.add_to_cache(&location(), version, &staged, info).unwrap();
    }

    fn resolver(store: &CacheStore, transport: &Arc<ScriptedTransport>) -> Resolver {
        let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
        Resolver::new(store.clone(), transport, PrioritizedProber::default())
    }

    // ==================== Cache Short-Circuit Tests ====================

    #[tokio::test]
    async fn test_fresh_cached_entry_needs_no_probe() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", None);
        let transport = Arc::new(ScriptedTransport::new());

        let resolution = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Never)
            .await
            .unwrap();

        assert!(matches!(resolution, Resolution::Cached { revalidated: false, .. }));
        assert_eq!(transport.probe_count(ProbeMethod::Head), 0);
    }

    #[tokio::test]
    async fn test_range_served_from_best_cached_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, Some(&VersionId::parse("1.1").unwrap()), b"a", None);
        seed(&store, Some(&VersionId::parse("1.5").unwrap()), b"b", None);
        let transport = Arc::new(ScriptedTransport::new());
        let range = VersionString::parse("1.0+").unwrap();

        let resolution = resolver(&store, &transport)
            .resolve(&location(), Some(&range), DownloadOptions::NONE, UpdatePolicy::Always)
            .await
            .unwrap();

        let Resolution::Cached { version, .. } = resolution else {
            panic!("expected cached resolution");
        };
        assert_eq!(version, Some(VersionId::parse("1.5").unwrap()));
    }

    #[tokio::test]
    async fn test_range_without_cached_version_is_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let transport = Arc::new(ScriptedTransport::new());
        let range = VersionString::parse("2.0*").unwrap();

        let error = resolver(&store, &transport)
            .resolve(&location(), Some(&range), DownloadOptions::NONE, UpdatePolicy::Always)
            .await
            .unwrap_err();

        assert!(matches!(error, ResolveError::RangeUnsupported { .. }));
        assert_eq!(transport.probe_count(ProbeMethod::Head), 0);
    }

    // ==================== Revalidation Tests ====================

    #[tokio::test]
    async fn test_unchanged_last_modified_keeps_cached_copy() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", Some(1_000_000));
        let transport = Arc::new(
            ScriptedTransport::new().with_route(LOCATION, Route::ok("jar").last_modified_secs(1_000)),
        );

        let resolution = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Always)
            .await
            .unwrap();

        assert!(matches!(resolution, Resolution::Cached { revalidated: true, .. }));
        assert_eq!(transport.probe_count(ProbeMethod::Head), 1);
    }

    #[tokio::test]
    async fn test_changed_last_modified_fetches() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", Some(1_000_000));
        let transport = Arc::new(
            ScriptedTransport::new().with_route(LOCATION, Route::ok("jar2").last_modified_secs(2_000)),
        );

        let resolution = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Always)
            .await
            .unwrap();

        let Resolution::Fetch { probe, version } = resolution else {
            panic!("expected fetch");
        };
        assert_eq!(probe.url.as_str(), LOCATION);
        assert!(version.is_none());
    }

    #[tokio::test]
    async fn test_force_ignores_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", Some(1_000_000));
        let transport = Arc::new(
            ScriptedTransport::new().with_route(LOCATION, Route::ok("jar").last_modified_secs(1_000)),
        );

        let resolution = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Force)
            .await
            .unwrap();

        assert!(matches!(resolution, Resolution::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_falls_back_to_cached_copy() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", Some(1_000_000));
        let transport = Arc::new(ScriptedTransport::new());

        let resolution = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Always)
            .await
            .unwrap();

        let Resolution::Cached { local_file, revalidated, .. } = resolution else {
            panic!("expected cached resolution");
        };
        assert!(!revalidated);
        assert_eq!(fs::read(local_file).unwrap(), b"jar");
        assert_eq!(transport.probe_count(ProbeMethod::Head), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_with_force_does_not_use_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        seed(&store, None, b"jar", Some(1_000_000));
        let transport = Arc::new(ScriptedTransport::new());

        let error = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::NONE, UpdatePolicy::Force)
            .await
            .unwrap_err();

        assert!(matches!(error, ResolveError::Probe { .. }));
    }

    // ==================== Probing Tests ====================

    #[tokio::test]
    async fn test_versioned_candidate_preferred() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_route("http://h/app__V1.0.jar", Route::ok("v"))
                .with_route("http://h/app.jar?version-id=1.0", Route::ok("q")),
        );
        let version = VersionString::parse("1.0").unwrap();

        let resolution = resolver(&store, &transport)
            .resolve(
                &location(),
                Some(&version),
                DownloadOptions::new(false, true),
                UpdatePolicy::Always,
            )
            .await
            .unwrap();

        let Resolution::Fetch { probe, version } = resolution else {
            panic!("expected fetch");
        };
        assert_eq!(probe.url.as_str(), "http://h/app__V1.0.jar");
        assert_eq!(version, Some(VersionId::parse("1.0").unwrap()));
    }

    #[tokio::test]
    async fn test_all_candidates_failing_reports_each() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let transport = Arc::new(ScriptedTransport::new());

        let error = resolver(&store, &transport)
            .resolve(&location(), None, DownloadOptions::new(true, false), UpdatePolicy::Always)
            .await
            .unwrap_err();

        let ResolveError::Probe {
            source: ProbeError::AllFailed { failures },
            ..
        } = error
        else {
            panic!("expected probe failure");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("app.jar.pack.gz"));
        assert_eq!(transport.probe_count(ProbeMethod::Get), 2);
    }
}
