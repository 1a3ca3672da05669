//! Staleness rules for cached entries.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use super::entry::EntryInfo;
use super::unix_millis;

/// Decides whether a cached copy must be revalidated against the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Always revalidate (threshold 0).
    #[default]
    Always,
    /// Never revalidate a cached copy.
    Never,
    /// Ignore the cache entirely and refetch.
    Force,
    /// Revalidate once the entry is older than the given age.
    After(Duration),
}

impl UpdatePolicy {
    /// Returns true if an entry with this metadata should be revalidated at `now`.
    ///
    /// An entry that was never updated is always stale under [`UpdatePolicy::After`].
    #[must_use]
    pub fn should_update(&self, info: &EntryInfo, now: SystemTime) -> bool {
        match self {
            Self::Always | Self::Force => true,
            Self::Never => false,
            Self::After(threshold) => {
                let Some(last_updated) = info.last_updated else {
                    return true;
                };
                let age_ms = unix_millis(now).saturating_sub(last_updated);
                u128::from(age_ms) >= threshold.as_millis()
            }
        }
    }

    /// Returns true if cached copies must be ignored altogether.
    #[must_use]
    pub fn is_force(&self) -> bool {
        matches!(self, Self::Force)
    }
}

/// Error returned when parsing an [`UpdatePolicy`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid update policy '{0}': expected always, never, force, or <millis>ms")]
pub struct ParsePolicyError(String);

impl FromStr for UpdatePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "force" => Ok(Self::Force),
            other => other
                .strip_suffix("ms")
                .and_then(|millis| millis.trim().parse::<u64>().ok())
                .map(|millis| Self::After(Duration::from_millis(millis)))
                .ok_or_else(|| ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Never => f.write_str("never"),
            Self::Force => f.write_str("force"),
            Self::After(threshold) => write!(f, "{}ms", threshold.as_millis()),
        }
    }
}
