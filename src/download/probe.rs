//! Remote probe: find out whether a candidate URL is reachable.

use std::fmt;
use std::time::SystemTime;

use tracing::{debug, instrument};
use url::Url;

use super::constants::PACK_SUFFIX;
use super::error::DownloadError;
use super::transport::Transport;
use crate::cache::unix_millis;
use crate::version::VersionId;

/// HTTP method used to probe a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Head,
    Get,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str("HEAD"),
            Self::Get => f.write_str("GET"),
        }
    }
}

/// What a probe learned about one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Final HTTP status.
    pub status: u16,
    /// Effective URL after redirects.
    pub url: Url,
    /// Parsed `Last-Modified`, if the server sent a valid one.
    pub last_modified: Option<SystemTime>,
    /// Advertised `Content-Length`.
    pub content_length: Option<u64>,
    /// True when the body is a packed (gzip) transfer.
    pub packed: bool,
    /// Version the server says it serves, from `x-java-jnlp-version-id`.
    pub version_id: Option<VersionId>,
}

impl ProbeResult {
    /// Builds a result, deriving `packed` from the URL and the content encoding.
    #[must_use]
    pub fn new(
        status: u16,
        url: Url,
        last_modified: Option<SystemTime>,
        content_length: Option<u64>,
        pack_encoded: bool,
    ) -> Self {
        let packed = pack_encoded || is_packed_url(&url);
        Self {
            status,
            url,
            last_modified,
            content_length,
            packed,
            version_id: None,
        }
    }

    #[must_use]
    pub fn with_version_id(mut self, version_id: Option<VersionId>) -> Self {
        self.version_id = version_id;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Success or redirect.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.is_success() || self.is_redirect()
    }

    /// `last_modified` as milliseconds since the epoch.
    #[must_use]
    pub fn last_modified_millis(&self) -> Option<u64> {
        self.last_modified.map(unix_millis)
    }
}

/// Returns true if the URL path names a packed artifact.
#[must_use]
pub fn is_packed_url(url: &Url) -> bool {
    url.path().ends_with(PACK_SUFFIX)
}

/// Probes `url` with HEAD, falling back to GET when HEAD errors or is not reachable.
///
/// # Errors
///
/// Returns the GET failure, or [`DownloadError::HttpStatus`] when GET
/// answers with a status that is neither success nor redirect.
#[instrument(skip(transport), fields(url = %url))]
pub async fn probe_candidate(
    transport: &dyn Transport,
    url: &Url,
) -> Result<ProbeResult, DownloadError> {
    match transport.probe(url, ProbeMethod::Head).await {
        Ok(result) if result.is_reachable() => return Ok(result),
        Ok(result) => debug!(status = result.status, "HEAD not usable, trying GET"),
        Err(e) => debug!(error = %e, "HEAD failed, trying GET"),
    }

    let result = transport.probe(url, ProbeMethod::Get).await?;
    if result.is_reachable() {
        Ok(result)
    } else {
        Err(DownloadError::http_status(url.as_str(), result.status))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::download::transport::FetchResponse;

    /// Answers HEAD and GET from fixed outcomes and records the calls.
    #[derive(Debug)]
    struct ScriptedTransport {
        head: Option<u16>,
        get: Option<u16>,
        calls: Mutex<Vec<ProbeMethod>>,
    }

    impl ScriptedTransport {
        fn new(head: Option<u16>, get: Option<u16>) -> Self {
            Self {
                head,
                get,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn probe(&self, url: &Url, method: ProbeMethod) -> Result<ProbeResult, DownloadError> {
            self.calls.lock().unwrap().push(method);
            let outcome = match method {
                ProbeMethod::Head => self.head,
                ProbeMethod::Get => self.get,
            };
            match outcome {
                Some(status) => Ok(ProbeResult::new(status, url.clone(), None, Some(3), false)),
                None => Err(DownloadError::timeout(url.as_str())),
            }
        }

        async fn fetch(&self, url: &Url) -> Result<FetchResponse, DownloadError> {
            Err(DownloadError::invalid_url(url.as_str()))
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_probe_result_flags() {
        let ok = ProbeResult::new(200, url("http://h/a.jar"), None, None, false);
        assert!(ok.is_success() && ok.is_reachable() && !ok.packed);

        let moved = ProbeResult::new(302, url("http://h/a.jar"), None, None, false);
        assert!(moved.is_redirect() && moved.is_reachable());

        let missing = ProbeResult::new(404, url("http://h/a.jar"), None, None, false);
        assert!(!missing.is_reachable());
    }

    #[test]
    fn test_packed_derived_from_url_or_encoding() {
        assert!(ProbeResult::new(200, url("http://h/a.jar.pack.gz"), None, None, false).packed);
        assert!(ProbeResult::new(200, url("http://h/a.jar"), None, None, true).packed);
    }

    #[tokio::test]
    async fn test_head_success_skips_get() {
        let transport = ScriptedTransport::new(Some(200), Some(200));
        let result = probe_candidate(&transport, &url("http://h/a.jar")).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(*transport.calls.lock().unwrap(), vec![ProbeMethod::Head]);
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let transport = ScriptedTransport::new(Some(405), Some(200));
        let result = probe_candidate(&transport, &url("http://h/a.jar")).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec![ProbeMethod::Head, ProbeMethod::Get]
        );
    }

    #[tokio::test]
    async fn test_head_error_falls_back_to_get() {
        let transport = ScriptedTransport::new(None, Some(200));
        assert!(probe_candidate(&transport, &url("http://h/a.jar")).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_failure_is_returned() {
        let transport = ScriptedTransport::new(Some(404), Some(404));
        let error = probe_candidate(&transport, &url("http://h/a.jar"))
            .await
            .unwrap_err();
        assert!(matches!(error, DownloadError::HttpStatus { status: 404, .. }));

        let transport = ScriptedTransport::new(None, None);
        let error = probe_candidate(&transport, &url("http://h/a.jar"))
            .await
            .unwrap_err();
        assert!(matches!(error, DownloadError::Timeout { .. }));
    }
}
