//! Identity of a tracked resource.

use std::fmt;

use url::Url;

use crate::version::VersionString;

/// `(normalized location, requested version)`.
///
/// Two requests name the same resource iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    location: Url,
    version: Option<VersionString>,
}

impl ResourceKey {
    #[must_use]
    pub fn new(location: &Url, version: Option<&VersionString>) -> Self {
        Self {
            location: normalize_location(location),
            version: version.cloned(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &Url {
        &self.location
    }

    #[must_use]
    pub fn version(&self) -> Option<&VersionString> {
        self.version.as_ref()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({version})", self.location),
            None => write!(f, "{}", self.location),
        }
    }
}

/// Canonical form of a location used for identity.
///
/// Parsing already lowercases the scheme and (for http-like schemes) the
/// host, drops a default port, and turns an empty path into `/`. This also
/// lowercases hosts of other schemes and removes the fragment.
#[must_use]
pub fn normalize_location(location: &Url) -> Url {
    let mut normalized = location.clone();
    normalized.set_fragment(None);
    if let Some(host) = location.host_str() {
        let lower = host.to_ascii_lowercase();
        if lower != host {
            // Only fails for URLs that cannot carry a host, which this one does.
            let _ = normalized.set_host(Some(&lower));
        }
    }
    if normalized.port().is_some() && normalized.port() == default_port(normalized.scheme()) {
        let _ = normalized.set_port(None);
    }
    normalized
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}
