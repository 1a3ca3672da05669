//! The seam between the downloader and the network.
//!
//! [`HttpClient`](super::HttpClient) is the production implementation. Tests
//! plug in scripted transports to simulate unreachable or flaky servers.

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use url::Url;

use super::error::DownloadError;
use super::probe::{ProbeMethod, ProbeResult};
use crate::version::VersionId;

/// Body chunks of a fetch, in arrival order.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, DownloadError>>;

/// An open GET response whose body has not been read yet.
pub struct FetchResponse {
    /// Effective URL after redirects.
    pub url: Url,
    /// Advertised `Content-Length`.
    pub content_length: Option<u64>,
    /// Parsed `Last-Modified`.
    pub last_modified: Option<SystemTime>,
    /// True when the body must be gunzipped before caching.
    pub packed: bool,
    /// Version the server says it sent.
    pub version_id: Option<VersionId>,
    pub body: BodyStream,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("url", &self.url.as_str())
            .field("content_length", &self.content_length)
            .field("last_modified", &self.last_modified)
            .field("packed", &self.packed)
            .field("version_id", &self.version_id)
            .finish_non_exhaustive()
    }
}

/// Probes and fetches remote artifacts.
// async-trait keeps the trait object-safe for `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Issues a HEAD or GET and reports the response metadata without reading a body.
    ///
    /// Non-success statuses are returned as `Ok`; only transport failures are `Err`.
    async fn probe(&self, url: &Url, method: ProbeMethod) -> Result<ProbeResult, DownloadError>;

    /// Issues a GET and returns the streaming body.
    ///
    /// Non-success statuses are `Err(DownloadError::HttpStatus)`.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, DownloadError>;
}
