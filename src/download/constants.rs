//! Constants for the download module (timeouts, headers, packed transfers).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large artifacts).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// `Accept-Encoding` sent with every probe and fetch.
pub const ACCEPT_ENCODING_VALUE: &str = "pack200-gzip, gzip";

/// `Content-Encoding` token announcing a packed body.
pub const PACK200_ENCODING: &str = "pack200-gzip";

/// Response header carrying the version the server actually sent.
pub const VERSION_ID_HEADER: &str = "x-java-jnlp-version-id";

/// Path suffix of packed candidates.
pub const PACK_SUFFIX: &str = ".pack.gz";

/// Default `User-Agent`.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
