//! Progress events and aggregate percentages.

use std::sync::Arc;

use super::record::Resource;
use super::status::ResourceStatus;

/// One progress event for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub transferred: u64,
    /// Total size, or `-1` while unknown.
    pub size: i64,
    pub status: ResourceStatus,
    /// Set on the final event.
    pub done: bool,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            transferred: 0,
            size: super::record::UNKNOWN_SIZE,
            status: ResourceStatus::Incomplete,
            done: false,
        }
    }
}

impl Progress {
    /// Percentage in 0..=100 for this event.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.done {
            return 100;
        }
        match u64::try_from(self.size) {
            Ok(size) if size > 0 => {
                let pct = self.transferred.saturating_mul(100) / size;
                u8::try_from(pct.min(100)).unwrap_or(100)
            }
            _ => 0,
        }
    }
}

/// A set of resources whose progress is reported together.
#[derive(Debug, Clone, Default)]
pub struct ProgressGroup {
    resources: Vec<Arc<Resource>>,
}

impl ProgressGroup {
    #[must_use]
    pub fn new(resources: Vec<Arc<Resource>>) -> Self {
        Self { resources }
    }

    #[must_use]
    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    /// Average completion over the group. An empty group is 100% done.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.resources.is_empty() {
            return 100;
        }
        let sum: usize = self
            .resources
            .iter()
            .map(|r| usize::from(r.progress().percentage()))
            .sum();
        u8::try_from(sum / self.resources.len()).unwrap_or(100)
    }

    /// True once every resource reached a terminal state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.resources.iter().all(|r| r.is_complete())
    }
}
