//! Process-wide identity map of resources.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use super::key::ResourceKey;
use super::record::Resource;
use crate::cache::UpdatePolicy;
use crate::resolver::DownloadOptions;

static GLOBAL: LazyLock<Arc<ResourceRegistry>> = LazyLock::new(|| Arc::new(ResourceRegistry::new()));

/// Hands out one shared [`Resource`] per [`ResourceKey`].
///
/// Entries are weak: once every tracker drops a resource, the next request
/// for the same identity starts fresh.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: Mutex<HashMap<ResourceKey, Weak<Resource>>>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every tracker that does not inject its own.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the live resource for `key`, or creates and records a new one.
    ///
    /// `options` and `policy` only apply when a new resource is created.
    pub fn get_or_create(
        &self,
        key: &ResourceKey,
        options: DownloadOptions,
        policy: UpdatePolicy,
    ) -> Arc<Resource> {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        entries.retain(|_, weak| weak.strong_count() > 0);
        let resource = Resource::new(key.clone(), options, policy);
        entries.insert(key.clone(), Arc::downgrade(&resource));
        trace!(key = %key, live = entries.len(), "registered resource");
        resource
    }

    /// Returns the live resource for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.entries().get(key).and_then(Weak::upgrade)
    }

    /// Number of live resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, Weak<Resource>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
