//! Candidate URLs an artifact may be served from.
//!
//! For `http://h/lib/app.jar` at version `1.2` with both options enabled,
//! the candidates are, in priority order:
//!
//! ```text
//! http://h/lib/app__V1.2.jar.pack.gz
//! http://h/lib/app__V1.2.jar
//! http://h/lib/app.jar.pack.gz?version-id=1.2
//! http://h/lib/app.jar?version-id=1.2
//! ```

use std::fmt;

use url::Url;

use crate::download::PACK_SUFFIX;
use crate::version::VersionString;

/// Query parameter carrying the requested version.
pub const VERSION_ID_PARAM: &str = "version-id";

/// Infix placed before the extension of versioned file names.
const VERSION_INFIX: &str = "__V";

/// Which server-side naming conventions to try before the plain location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DownloadOptions {
    /// Try `<name>.pack.gz` variants.
    pub use_pack: bool,
    /// Try `<name>__V<version>.<ext>` variants.
    pub use_version: bool,
}

impl DownloadOptions {
    /// Plain location only.
    pub const NONE: Self = Self {
        use_pack: false,
        use_version: false,
    };

    #[must_use]
    pub const fn new(use_pack: bool, use_version: bool) -> Self {
        Self {
            use_pack,
            use_version,
        }
    }
}

impl fmt::Display for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pack={} version={}", self.use_pack, self.use_version)
    }
}

/// Returns the candidate URLs for `location`, most specific first, without duplicates.
///
/// The plain location (with a `version-id` query when a version is requested)
/// is always present and always last.
#[must_use]
pub fn build_candidates(
    location: &Url,
    version: Option<&VersionString>,
    options: DownloadOptions,
) -> Vec<Url> {
    let mut base = location.clone();
    base.set_fragment(None);
    let version = version.map(VersionString::as_str);

    let mut candidates = Vec::with_capacity(4);
    if has_file_name(&base) {
        if let Some(v) = version.filter(|_| options.use_pack && options.use_version) {
            candidates.push(renamed(&base, Some(v), true));
        }
        if let Some(v) = version.filter(|_| options.use_version) {
            candidates.push(renamed(&base, Some(v), false));
        }
        if options.use_pack {
            let packed = renamed(&base, None, true);
            candidates.push(with_version_query(packed, version));
        }
    }
    candidates.push(with_version_query(base, version));

    let mut unique: Vec<Url> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

fn has_file_name(url: &Url) -> bool {
    !url.cannot_be_a_base() && url.path().rsplit('/').next().is_some_and(|n| !n.is_empty())
}

fn renamed(url: &Url, version: Option<&str>, packed: bool) -> Url {
    let path = url.path();
    let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));

    let mut file_name = match (version, name.rsplit_once('.')) {
        (Some(v), Some((stem, ext))) => format!("{stem}{VERSION_INFIX}{v}.{ext}"),
        (Some(v), None) => format!("{name}{VERSION_INFIX}{v}"),
        (None, _) => name.to_string(),
    };
    if packed {
        file_name.push_str(PACK_SUFFIX);
    }

    let mut renamed = url.clone();
    renamed.set_path(&format!("{dir}/{file_name}"));
    renamed
}

fn with_version_query(mut url: Url, version: Option<&str>) -> Url {
    if let Some(v) = version {
        url.query_pairs_mut().append_pair(VERSION_ID_PARAM, v);
    }
    url
}
