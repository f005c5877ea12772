//! Tag registry and the process-level allocation facade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{Composer, Result, SegmentStore, TagAllocator, TimeSource};

/// Process-wide map from tag to its allocator.
///
/// Entries are created on first reference and live for the life of the
/// process; there is no eviction. The registry lock guards only the map
/// and is released before any allocator lock is taken.
pub struct Registry<S> {
    store: Arc<S>,
    tags: Mutex<HashMap<String, TagAllocator<S>>>,
}

impl<S: SegmentStore> Registry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            tags: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the allocator for `tag`, creating it on first reference.
    pub fn resolve(&self, tag: &str) -> Result<TagAllocator<S>> {
        let mut tags = self.tags.lock()?;
        let alloc = tags
            .entry(tag.to_string())
            .or_insert_with(|| TagAllocator::new(tag, Arc::clone(&self.store)));
        Ok(alloc.clone())
    }

    /// Returns the allocator for `tag` only if one already exists. Unlike
    /// [`Registry::resolve`] this never creates state, so probes do not
    /// populate the registry.
    pub fn get(&self, tag: &str) -> Result<Option<TagAllocator<S>>> {
        Ok(self.tags.lock()?.get(tag).cloned())
    }
}

/// The service-facing allocation API: registry and composer threaded
/// together as explicit dependencies, constructed once at startup.
pub struct IdAllocator<S, T> {
    registry: Registry<S>,
    composer: Composer<T>,
}

impl<S: SegmentStore, T: TimeSource> IdAllocator<S, T> {
    pub fn new(store: Arc<S>, composer: Composer<T>) -> Self {
        Self {
            registry: Registry::new(store),
            composer,
        }
    }

    /// Allocates the next ID for `tag` and runs it through the composer.
    ///
    /// May block up to the allocator's wait bound when the tag's buffer is
    /// empty; see [`TagAllocator::next_id`].
    pub fn next_id(&self, tag: &str) -> Result<i64> {
        let raw = self.registry.resolve(tag)?.next_id()?;
        Ok(self.composer.compose(raw))
    }

    /// IDs currently buffered for `tag`. A tag this process has never
    /// served reports 0 without creating an allocator.
    pub fn remaining(&self, tag: &str) -> Result<i64> {
        match self.registry.get(tag)? {
            Some(alloc) => alloc.remaining(),
            None => Ok(0),
        }
    }
}
