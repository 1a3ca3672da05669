//! Mapping from artifact locations to on-disk cache paths.
//!
//! Layout: `root/<scheme>/<host>/<port>[/V<version>]/<segments...>[.<query-hash>]`.
//! The port is always present so that two servers on the same host never
//! share a slot.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

use crate::version::VersionId;

/// Longest file-name component accepted before collapsing to a hash.
pub const MAX_NAME_LEN: usize = 255;

/// Number of hex chars of the query digest appended to the file name.
const QUERY_HASH_LEN: usize = 16;

/// Name used when the location path ends with `/`.
const INDEX_NAME: &str = "index";

/// Returns the cache file path for `location` at `version`.
#[must_use]
pub fn cache_path(root: &Path, location: &Url, version: Option<&VersionId>) -> PathBuf {
    let mut dir = location_dir(root, location);
    if let Some(version) = version {
        dir.push(version_dir_name(version));
    }

    let mut segments: Vec<String> = location
        .path_segments()
        .map(|split| split.map(decode_segment).collect())
        .unwrap_or_default();
    let file_name = match segments.pop() {
        Some(last) if !last.is_empty() => last,
        _ => INDEX_NAME.to_string(),
    };
    let file_name = match location.query().filter(|q| !q.is_empty()) {
        Some(query) => format!("{file_name}.{}", &hex_digest(query)[..QUERY_HASH_LEN]),
        None => file_name,
    };

    let raw: Vec<&str> = segments
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .chain(std::iter::once(file_name.as_str()))
        .collect();
    let components: Vec<String> = raw.iter().map(|s| sanitize_component(s)).collect();

    // Rewritten or over-long names would let distinct locations share a slot.
    let lossy = components
        .iter()
        .zip(&raw)
        .any(|(component, raw)| component != raw || component.len() > MAX_NAME_LEN);
    if lossy {
        return dir.join(hashed_name(location, &file_name));
    }

    for component in components {
        dir.push(component);
    }
    dir
}

/// Returns `root/<scheme>/<host>/<port>` for `location`.
#[must_use]
pub fn location_dir(root: &Path, location: &Url) -> PathBuf {
    let host = location.host_str().unwrap_or("localhost");
    let port = location.port_or_known_default().unwrap_or(0);
    root.join(sanitize_component(location.scheme()))
        .join(sanitize_component(host))
        .join(port.to_string())
}

/// Directory name holding artifacts of one version.
///
/// Built from [`VersionId::canonical`] so equal ids share one directory.
#[must_use]
pub fn version_dir_name(version: &VersionId) -> String {
    format!("V{}", sanitize_component(&version.canonical()))
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// `.` and `..` become `_` so a component can never climb the tree.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    if raw == "." || raw == ".." {
        return "_".to_string();
    }
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned)
}

fn hashed_name(location: &Url, file_name: &str) -> String {
    let digest = hex_digest(location.as_str());
    match file_name.rsplit_once('.') {
        Some((_, ext)) if (2..=9).contains(&ext.len()) => {
            format!("{digest}.{}", sanitize_component(ext))
        }
        _ => digest,
    }
}

fn hex_digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_cache_path_layout_with_default_port() {
        let path = cache_path(Path::new("/c"), &url("https://example.com/lib/app.jar"), None);
        assert_eq!(path, PathBuf::from("/c/https/example.com/443/lib/app.jar"));
    }

    #[test]
    fn test_cache_path_distinguishes_ports() {
        let a = cache_path(Path::new("/c"), &url("http://example.com/app.jar"), None);
        let b = cache_path(Path::new("/c"), &url("http://example.com:8080/app.jar"), None);
        assert_ne!(a, b);
        assert!(a.starts_with("/c/http/example.com/80"));
        assert!(b.starts_with("/c/http/example.com/8080"));
    }

    #[test]
    fn test_cache_path_includes_version_dir() {
        let version = VersionId::parse("1.2-beta").unwrap();
        let path = cache_path(Path::new("/c"), &url("http://h/a.jar"), Some(&version));
        assert_eq!(path, PathBuf::from("/c/http/h/80/V1.2.beta/a.jar"));
    }

    #[test]
    fn test_cache_path_query_hashed_into_file_name() {
        let plain = cache_path(Path::new("/c"), &url("http://h/a.jar"), None);
        let q1 = cache_path(Path::new("/c"), &url("http://h/a.jar?x=1"), None);
        let q2 = cache_path(Path::new("/c"), &url("http://h/a.jar?x=2"), None);
        assert_ne!(q1, q2);
        assert_ne!(plain, q1);
        let name = q1.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("a.jar."));
        assert_eq!(name.len(), "a.jar.".len() + QUERY_HASH_LEN);
    }

    #[test]
    fn test_cache_path_sanitizes_unsafe_segments() {
        let path = cache_path(Path::new("/c"), &url("http://h/a%20b/..%2F/x:y.jar"), None);
        assert!(path.starts_with("/c/http/h/80"));
        for component in path.strip_prefix("/c").unwrap().components() {
            let text = component.as_os_str().to_str().unwrap();
            assert!(text != "..", "path escaped: {}", path.display());
            assert!(!text.contains(' ') && !text.contains(':'));
        }
    }

    #[test]
    fn test_cache_path_keeps_rewritten_names_apart() {
        let root = Path::new("/c");
        let paths = [
            cache_path(root, &url("http://h/a%20b.jar"), None),
            cache_path(root, &url("http://h/a_b.jar"), None),
            cache_path(root, &url("http://h/a:b.jar"), None),
            cache_path(root, &url("http://h/x%20y/a.jar"), None),
            cache_path(root, &url("http://h/x_y/a.jar"), None),
        ];
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(paths[1], PathBuf::from("/c/http/h/80/a_b.jar"));
        assert!(paths[0].extension().is_some_and(|ext| ext == "jar"));
    }

    #[test]
    fn test_equal_versions_share_a_directory() {
        let location = url("http://h/a.jar");
        let short = VersionId::parse("1").unwrap();
        let long = VersionId::parse("1.0.0").unwrap();
        assert_eq!(
            cache_path(Path::new("/c"), &location, Some(&short)),
            cache_path(Path::new("/c"), &location, Some(&long))
        );
        assert_eq!(version_dir_name(&long), "V1");
    }

    #[test]
    fn test_cache_path_trailing_slash_uses_index() {
        let path = cache_path(Path::new("/c"), &url("http://h/dir/"), None);
        assert_eq!(path, PathBuf::from("/c/http/h/80/dir/index"));
    }

    #[test]
    fn test_cache_path_long_name_collapses_to_hash_keeping_extension() {
        let long = "a".repeat(300);
        let location = url(&format!("http://h/{long}.jar"));
        let path = cache_path(Path::new("/c"), &location, None);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".jar".len());
        assert!(name.ends_with(".jar"));
        assert_eq!(path.parent().unwrap(), Path::new("/c/http/h/80"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("ok-name_1.jar"), "ok-name_1.jar");
        assert_eq!(sanitize_component("a b/c"), "a_b_c");
        assert_eq!(sanitize_component(".."), "_");
    }
}
