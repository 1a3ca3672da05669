//! In-memory [`Transport`] for tests that must not touch the network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use url::Url;

use crate::download::{DownloadError, FetchResponse, ProbeMethod, ProbeResult, Transport};
use crate::version::VersionId;

/// A canned answer for one URL.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub last_modified: Option<SystemTime>,
    /// Advertised length; defaults to the body length.
    pub content_length: Option<u64>,
    /// Bytes per body chunk.
    pub chunk_size: usize,
    /// Sent as `x-java-jnlp-version-id`.
    pub version_id: Option<VersionId>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
            last_modified: None,
            chunk_size: 4,
            version_id: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            last_modified: None,
            content_length: None,
            chunk_size: 4,
            version_id: None,
        }
    }

    #[must_use]
    pub fn last_modified_secs(mut self, secs: u64) -> Self {
        self.last_modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
        self
    }

    #[must_use]
    pub fn version_id(mut self, version: &str) -> Self {
        self.version_id = VersionId::parse(version).ok();
        self
    }

    #[must_use]
    pub fn content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }
}

/// Serves [`Route`]s by exact URL; unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    probes: Mutex<Vec<(ProbeMethod, String)>>,
    fetches: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_route(self, url: &str, route: Route) -> Self {
        self.set_route(url, route);
        self
    }

    pub fn set_route(&self, url: &str, route: Route) {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(url.to_string(), route);
    }

    /// Number of probes issued with `method`.
    pub fn probe_count(&self, method: ProbeMethod) -> usize {
        self.probes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn route(&self, url: &Url) -> Route {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Route::status(404))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn probe(&self, url: &Url, method: ProbeMethod) -> Result<ProbeResult, DownloadError> {
        self.probes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((method, url.to_string()));
        let route = self.route(url);
        Ok(ProbeResult::new(
            route.status,
            url.clone(),
            route.last_modified,
            route.content_length,
            false,
        )
        .with_version_id(route.version_id))
    }

    async fn fetch(&self, url: &Url) -> Result<FetchResponse, DownloadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let route = self.route(url);
        if !(200..300).contains(&route.status) {
            return Err(DownloadError::http_status(url.as_str(), route.status));
        }
        let chunks: Vec<Result<Vec<u8>, DownloadError>> = route
            .body
            .chunks(route.chunk_size.max(1))
            .map(|c| Ok(c.to_vec()))
            .collect();
        let probe = ProbeResult::new(route.status, url.clone(), None, None, false);
        Ok(FetchResponse {
            url: url.clone(),
            content_length: route.content_length,
            last_modified: route.last_modified,
            packed: probe.packed,
            version_id: route.version_id,
            body: stream::iter(chunks).boxed(),
        })
    }
}
