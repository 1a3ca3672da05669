//! Version ranges and version strings.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::error::VersionError;
use super::id::VersionId;

/// Trailing modifier of a simple range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `1.4+`: the id or any greater id.
    OrGreater,
    /// `1.4*`: any id that has the given id as a prefix.
    Prefix,
}

/// A single id with an optional modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleRange {
    id: VersionId,
    modifier: Option<Modifier>,
}

impl SimpleRange {
    fn parse(input: &str) -> Result<Self, VersionError> {
        let (body, modifier) = match input.chars().last() {
            Some('+') => (&input[..input.len() - 1], Some(Modifier::OrGreater)),
            Some('*') => (&input[..input.len() - 1], Some(Modifier::Prefix)),
            _ => (input, None),
        };
        let id = VersionId::parse(body)
            .map_err(|_| VersionError::invalid_range(input, "invalid version id"))?;
        Ok(Self { id, modifier })
    }

    /// Returns the id without its modifier.
    #[must_use]
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Returns the modifier, if any.
    #[must_use]
    pub fn modifier(&self) -> Option<Modifier> {
        self.modifier
    }

    fn matches(&self, candidate: &VersionId) -> bool {
        match self.modifier {
            None => self.id == *candidate,
            Some(Modifier::OrGreater) => *candidate >= self.id,
            Some(Modifier::Prefix) => self.id.is_prefix_of(candidate),
        }
    }
}

/// A simple range (`1.4`, `1.4+`, `1.4*`) or a compound range (`1.4*&1.4.1_02+`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// One id with an optional modifier.
    Simple(SimpleRange),
    /// Several simple ranges that must all match.
    Compound(Vec<SimpleRange>),
}

impl VersionRange {
    /// Parses a range.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if any part is not a valid simple range.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.is_empty() {
            return Err(VersionError::Empty);
        }
        if !input.contains('&') {
            return SimpleRange::parse(input).map(Self::Simple);
        }
        let parts = input
            .split('&')
            .map(|part| {
                if part.is_empty() {
                    Err(VersionError::invalid_range(input, "empty compound part"))
                } else {
                    SimpleRange::parse(part)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Compound(parts))
    }

    /// Returns true if `candidate` lies within this range.
    #[must_use]
    pub fn matches(&self, candidate: &VersionId) -> bool {
        match self {
            Self::Simple(simple) => simple.matches(candidate),
            Self::Compound(parts) => parts.iter().all(|p| p.matches(candidate)),
        }
    }

    /// Returns the id if this range names exactly one version.
    #[must_use]
    pub fn exact(&self) -> Option<&VersionId> {
        match self {
            Self::Simple(SimpleRange { id, modifier: None }) => Some(id),
            _ => None,
        }
    }

    /// Returns true if this range names exactly one version.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact().is_some()
    }
}

/// A whitespace-separated list of ranges, as written in a `version` attribute.
///
/// Equality and hashing use the text as written: `1.0` and `1.0.0` are
/// different requests even though the ids compare equal.
#[derive(Debug, Clone)]
pub struct VersionString {
    raw: String,
    ranges: Vec<VersionRange>,
}

impl VersionString {
    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Empty`] for blank input, or the first range error.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let ranges = input
            .split_whitespace()
            .map(VersionRange::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if ranges.is_empty() {
            return Err(VersionError::Empty);
        }
        Ok(Self {
            raw: input.trim().to_string(),
            ranges,
        })
    }

    /// Returns the ranges in the order written.
    #[must_use]
    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    /// Returns true if any range matches `candidate`.
    #[must_use]
    pub fn contains(&self, candidate: &VersionId) -> bool {
        self.ranges.iter().any(|r| r.matches(candidate))
    }

    /// Returns the single exact id this string requests, if any.
    #[must_use]
    pub fn exact(&self) -> Option<&VersionId> {
        match self.ranges.as_slice() {
            [only] => only.exact(),
            _ => None,
        }
    }

    /// Returns the text as written (trimmed).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for VersionString {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionString {}

impl Hash for VersionString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionString {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<VersionId> for VersionString {
    fn from(id: VersionId) -> Self {
        Self {
            raw: id.as_str().to_string(),
            ranges: vec![VersionRange::Simple(SimpleRange { id, modifier: None })],
        }
    }
}
