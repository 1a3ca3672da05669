//! Drives one resource from "registered" to "cached on disk".
//!
//! Each attempt resolves the location, then either adopts the cached copy or
//! streams the winning candidate into a staging file and commits it to the
//! cache. Transient failures are retried per [`RetryPolicy`]; the resource
//! ends in `Downloaded` or `Error`.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::probe::ProbeResult;
use super::prober::PrioritizedProber;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::transport::{BodyStream, Transport};
use crate::cache::{CacheError, CacheStore, EntryInfo, unix_millis};
use crate::resolver::{Resolution, Resolver, build_candidates};
use crate::resource::{DownloadFailure, Resource, ResourceStatus};
use crate::version::VersionId;

/// Downloads resources into a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct ResourceDownloader {
    store: CacheStore,
    transport: Arc<dyn Transport>,
    resolver: Resolver,
    retry_policy: RetryPolicy,
}

impl ResourceDownloader {
    #[must_use]
    pub fn new(store: CacheStore, transport: Arc<dyn Transport>, retry_policy: RetryPolicy) -> Self {
        let resolver = Resolver::new(
            store.clone(),
            Arc::clone(&transport),
            PrioritizedProber::default(),
        );
        Self {
            store,
            transport,
            resolver,
            retry_policy,
        }
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads `resource` and moves it to a terminal status.
    ///
    /// `file:` locations are used in place. Other schemes the cache cannot
    /// hold fail at once. Everything else goes through the cache. A versioned download is stored under the version the server
    /// reports in `x-java-jnlp-version-id`, when it sends one.
    ///
    /// # Errors
    ///
    /// Returns the last failure once every attempt is used up or a permanent
    /// failure occurs; the resource is left in [`ResourceStatus::Error`].
    #[instrument(skip(self, resource), fields(location = %resource.location()))]
    pub async fn download(&self, resource: &Arc<Resource>) -> Result<(), DownloadFailure> {
        let location = resource.location();
        let result = if location.scheme() == "file" {
            use_local_file(resource).await
        } else if !CacheStore::is_cacheable(location) {
            Err(DownloadError::cache(
                location.as_str(),
                CacheError::NotCacheable {
                    url: location.to_string(),
                },
            ))
        } else {
            self.download_with_retry(resource).await
        };
        match result {
            Ok(()) => {
                resource.set_status(ResourceStatus::Downloaded);
                Ok(())
            }
            Err(e) => {
                resource.set_status(ResourceStatus::Error);
                Err(Arc::new(e))
            }
        }
    }

    async fn download_with_retry(&self, resource: &Resource) -> Result<(), DownloadError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            match self.attempt(resource).await {
                Ok(()) => return Ok(()),
                Err(e) => match self.retry_policy.should_retry(classify_error(&e), attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        info!(
                            location = %resource.location(),
                            attempt = next_attempt,
                            max_attempts = self.retry_policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "retrying download"
                        );
                        resource.set_transferred(0);
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        let candidates =
                            build_candidates(resource.location(), resource.version(), resource.options());
                        warn!(
                            location = %resource.location(),
                            candidates = ?candidates.iter().map(Url::as_str).collect::<Vec<_>>(),
                            attempts = attempt,
                            %reason,
                            error = %e,
                            "could not download resource from any candidate"
                        );
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn attempt(&self, resource: &Resource) -> Result<(), DownloadError> {
        let location = resource.location();
        let resolution = self
            .resolver
            .resolve(location, resource.version(), resource.options(), resource.policy())
            .await
            .map_err(|e| DownloadError::resolve(location.as_str(), e))?;

        match resolution {
            Resolution::Cached {
                local_file,
                version,
                revalidated,
                ..
            } => {
                if revalidated {
                    self.touch(location, version).await;
                }
                adopt_file(resource, local_file).await
            }
            Resolution::Fetch { probe, version } => self.fetch(resource, &probe, version).await,
        }
    }

    /// Records that the server confirmed the cached copy is current.
    async fn touch(&self, location: &Url, version: Option<VersionId>) {
        let store = self.store.clone();
        let location = location.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let entry = store.entry(&location, version.as_ref());
            entry.lock()?;
            entry.set_last_updated(unix_millis(SystemTime::now()));
            let stored = entry.store();
            entry.unlock();
            Ok::<bool, CacheError>(stored)
        })
        .await;
        match outcome {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => warn!("could not record revalidation time"),
            Ok(Err(e)) => warn!(error = %e, "could not lock entry to record revalidation time"),
            Err(e) => warn!(error = %e, "revalidation bookkeeping task failed"),
        }
    }

    async fn fetch(
        &self,
        resource: &Resource,
        probe: &ProbeResult,
        version: Option<VersionId>,
    ) -> Result<(), DownloadError> {
        let location = resource.location().clone();
        let response = self.transport.fetch(&probe.url).await?;
        let url = response.url.to_string();
        let packed = response.packed || probe.packed;
        let advertised = response.content_length.or(probe.content_length);
        let last_modified = response.last_modified.or(probe.last_modified);
        let version = match response.version_id.clone().or_else(|| probe.version_id.clone()) {
            Some(reported) if resource.version().is_some() => {
                debug!(
                    requested = ?version.as_ref().map(VersionId::as_str),
                    reported = %reported,
                    "server reported version"
                );
                Some(reported)
            }
            _ => version,
        };

        resource.set_transferred(0);
        if let Some(length) = advertised {
            resource.set_size(to_size(length));
        }

        let received_file = self
            .store
            .staging_file(&location, version.as_ref())
            .map_err(|e| DownloadError::cache(location.as_str(), e))?;
        let received = match stream_to_file(resource, response.body, &received_file).await {
            Ok(received) => received,
            Err(e) => {
                discard(&received_file).await;
                return Err(e);
            }
        };
        debug!(url = %url, received, packed, "transfer finished");

        if let Some(expected) = advertised.filter(|expected| *expected > received) {
            discard(&received_file).await;
            return Err(DownloadError::integrity(url, expected, received));
        }

        let staged = if packed {
            let unpacked_file = self
                .store
                .staging_file(&location, version.as_ref())
                .map_err(|e| DownloadError::cache(location.as_str(), e))?;
            let result = unpack_blocking(url.clone(), received_file.clone(), unpacked_file.clone()).await;
            discard(&received_file).await;
            if let Err(e) = result {
                discard(&unpacked_file).await;
                return Err(e);
            }
            unpacked_file
        } else {
            received_file
        };

        let info = EntryInfo {
            last_modified: last_modified.map(unix_millis),
            last_updated: Some(unix_millis(SystemTime::now())),
            remote_content_length: Some(advertised.unwrap_or(received)),
            original_content_length: packed.then_some(received),
            packed,
        };
        let store = self.store.clone();
        let commit_location = location.clone();
        let cache_file = tokio::task::spawn_blocking(move || {
            store.add_to_cache(&commit_location, version.as_ref(), &staged, info)
        })
        .await
        .map_err(|e| DownloadError::TaskFailed {
            url: location.to_string(),
            reason: e.to_string(),
        })?
        .map_err(|e| DownloadError::cache(location.as_str(), e))?;

        adopt_file(resource, cache_file).await
    }
}

/// Points `resource` at an existing file and reports it fully transferred.
async fn adopt_file(resource: &Resource, path: PathBuf) -> Result<(), DownloadError> {
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| DownloadError::io(&path, e))?;
    resource.set_size(to_size(metadata.len()));
    resource.set_transferred(metadata.len());
    resource.set_local_file(Some(path));
    Ok(())
}

async fn use_local_file(resource: &Resource) -> Result<(), DownloadError> {
    let location = resource.location();
    let path = location
        .to_file_path()
        .map_err(|()| DownloadError::invalid_url(location.as_str()))?;
    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => adopt_file(resource, path).await,
        _ => Err(DownloadError::MissingLocalFile { path }),
    }
}

/// Streams `body` to `path`, counting every chunk on `resource`.
async fn stream_to_file(
    resource: &Resource,
    mut body: BodyStream,
    path: &Path,
) -> Result<u64, DownloadError> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
        resource.add_transferred(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    Ok(bytes_written)
}

async fn unpack_blocking(url: String, packed: PathBuf, target: PathBuf) -> Result<(), DownloadError> {
    let task_url = url.clone();
    tokio::task::spawn_blocking(move || unpack(&task_url, &packed, &target))
        .await
        .map_err(|e| DownloadError::TaskFailed {
            url,
            reason: e.to_string(),
        })?
}

fn unpack(url: &str, packed: &Path, target: &Path) -> Result<(), DownloadError> {
    let input = std::fs::File::open(packed).map_err(|e| DownloadError::io(packed, e))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = std::fs::File::create(target).map_err(|e| DownloadError::io(target, e))?;
    std::io::copy(&mut decoder, &mut output).map_err(|e| DownloadError::decompression(url, e))?;
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove staging file");
    }
}

fn to_size(length: u64) -> i64 {
    i64::try_from(length).unwrap_or(i64::MAX)
}
