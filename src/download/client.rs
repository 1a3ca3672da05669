//! HTTP client wrapper for probing and fetching artifacts.
//!
//! This module provides the `HttpClient` struct, the reqwest-backed
//! [`Transport`]. It is created once and shared so that every probe and
//! fetch reuses one connection pool.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, HeaderMap, LAST_MODIFIED};
use reqwest::{Client, Response};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    ACCEPT_ENCODING_VALUE, CONNECT_TIMEOUT_SECS, PACK200_ENCODING, READ_TIMEOUT_SECS, USER_AGENT,
    VERSION_ID_HEADER,
};
use super::error::DownloadError;
use super::probe::{ProbeMethod, ProbeResult};
use super::transport::{FetchResponse, Transport};
use crate::version::VersionId;

/// HTTP client for probing candidates and streaming artifact bodies.
///
/// # Example
///
/// ```no_run
/// use resource_cache::download::{HttpClient, ProbeMethod, Transport};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let url = Url::parse("https://example.com/app.jar")?;
/// let probe = client.probe(&url, ProbeMethod::Head).await?;
/// println!("{} -> {}", probe.url, probe.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large artifacts)
    /// - Gzip decompression of `Content-Encoding: gzip`: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = build_client(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn send_request(&self, method: ProbeMethod, url: &Url) -> Result<Response, DownloadError> {
        let request = match method {
            ProbeMethod::Head => self.client.head(url.clone()),
            ProbeMethod::Get => self.client.get(url.clone()),
        };
        request
            .header(ACCEPT_ENCODING, ACCEPT_ENCODING_VALUE)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url.as_str())
                } else {
                    DownloadError::network(url.as_str(), e)
                }
            })
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self), fields(url = %url, method = %method))]
    async fn probe(&self, url: &Url, method: ProbeMethod) -> Result<ProbeResult, DownloadError> {
        let response = self.send_request(method, url).await?;
        let result = probe_result(&response);
        debug!(
            status = result.status,
            content_length = ?result.content_length,
            packed = result.packed,
            "probe complete"
        );
        Ok(result)
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, DownloadError> {
        let response = self.send_request(ProbeMethod::Get, url).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url.as_str(), status));
        }

        let meta = probe_result(&response);
        let source = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| {
                        if e.is_timeout() {
                            DownloadError::timeout(source.as_str())
                        } else {
                            DownloadError::network(source.as_str(), e)
                        }
                    })
            })
            .boxed();

        Ok(FetchResponse {
            url: meta.url,
            content_length: meta.content_length,
            last_modified: meta.last_modified,
            packed: meta.packed,
            version_id: meta.version_id,
            body,
        })
    }
}

fn probe_result(response: &Response) -> ProbeResult {
    let headers = response.headers();
    ProbeResult::new(
        response.status().as_u16(),
        response.url().clone(),
        parse_last_modified(headers),
        parse_content_length(headers),
        is_pack_encoded(headers),
    )
    .with_version_id(parse_version_id(headers))
}

// Read the header directly: `Response::content_length` reports 0 for HEAD.
fn parse_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn parse_last_modified(headers: &HeaderMap) -> Option<SystemTime> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
}

// An unparseable id is ignored; the requested version is used instead.
fn parse_version_id(headers: &HeaderMap) -> Option<VersionId> {
    headers
        .get(VERSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| VersionId::parse(v.trim()).ok())
}

fn is_pack_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(PACK200_ENCODING))
        })
}

fn build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(USER_AGENT)
        .build()
}
