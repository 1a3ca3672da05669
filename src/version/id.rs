//! Exact version ids.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::VersionError;

/// Characters that split a version id into elements.
pub(crate) const SEPARATORS: [char; 3] = ['.', '-', '_'];

/// Characters with a meaning in version ranges/strings; never valid inside an element.
const RESERVED: [char; 4] = [' ', '&', '+', '*'];

/// One element of a version tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Element {
    Numeric(u64),
    Text(String),
}

static ZERO_ELEMENT: Element = Element::Numeric(0);

impl Element {
    fn parse(raw: &str) -> Self {
        raw.parse::<u64>()
            .map_or_else(|_| Self::Text(raw.to_string()), Self::Numeric)
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An exact version id such as `1.2.2-001` or `1.3.0-rc2-w`.
///
/// Ids are compared element-wise after padding the shorter tuple with `0`,
/// so `1`, `1.0` and `1.0.0-0` are all equal. Numeric elements compare by
/// value and sort before alphanumeric ones.
#[derive(Debug, Clone)]
pub struct VersionId {
    raw: String,
    elements: Vec<Element>,
}

impl VersionId {
    /// Parses an exact version id.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the input is empty, contains an empty
    /// element, or contains whitespace or one of `&`, `+`, `*`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.is_empty() {
            return Err(VersionError::Empty);
        }
        let elements = parse_elements(input).map_err(|r| VersionError::invalid_id(input, r))?;
        Ok(Self {
            raw: input.to_string(),
            elements,
        })
    }

    /// Returns the id exactly as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns a spelling shared by every id equal to this one.
    ///
    /// Elements are joined with `.`, numbers lose leading zeros and trailing
    /// zero elements are dropped: `1.0`, `1-0-0` and `01` all give `1`.
    #[must_use]
    pub fn canonical(&self) -> String {
        let significant = &self.elements[..self.significant_len()];
        if significant.is_empty() {
            return "0".to_string();
        }
        significant
            .iter()
            .map(|element| match element {
                Element::Numeric(n) => n.to_string(),
                Element::Text(t) => t.clone(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Returns true if every element of `self` equals the matching element of `other`.
    ///
    /// `1.0` is a prefix of `1.0.4` and of `1.0`; it is not a prefix of `1.1`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &VersionId) -> bool {
        self.elements
            .iter()
            .enumerate()
            .all(|(i, element)| element == other.element_at(i))
    }

    fn element_at(&self, index: usize) -> &Element {
        self.elements.get(index).unwrap_or(&ZERO_ELEMENT)
    }

    fn significant_len(&self) -> usize {
        self.elements
            .iter()
            .rposition(|e| *e != ZERO_ELEMENT)
            .map_or(0, |i| i + 1)
    }
}

fn parse_elements(input: &str) -> Result<Vec<Element>, &'static str> {
    input
        .split(SEPARATORS)
        .map(|part| {
            if part.is_empty() {
                Err("empty element")
            } else if part
                .chars()
                .any(|c| c.is_whitespace() || RESERVED.contains(&c))
            {
                Err("element contains a reserved character")
            } else {
                Ok(Element::parse(part))
            }
        })
        .collect()
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.elements.len().max(other.elements.len());
        (0..len)
            .map(|i| self.element_at(i).cmp(other.element_at(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for VersionId {}

impl Hash for VersionId {
    // Trailing zero elements are ignored so that equal ids hash equally.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements[..self.significant_len()].hash(state);
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
