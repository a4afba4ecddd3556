//! Process-wide cache of rendered index pages.
//!
//! Entries expire after a fixed time to live and every write that changes
//! what the index shows drops all of them.
//!
//! Entries are keyed on a generation that [`PageCache::invalidate`] bumps. A
//! page rendered from a read that overlapped a write is stored under the old
//! generation and never served.

use moka::future::Cache;
use std::{
    fmt::{Debug, Formatter},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::debug;

/// Index pages cached per raw `page` query value.
const MAX_CACHED_PAGES: u64 = 256;

#[derive(Clone)]
pub struct PageCache {
    pages: Cache<(u64, String), String>,
    generation: Arc<AtomicU64>,
    enabled: bool,
}

impl PageCache {
    /// A zero `ttl` turns caching off.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(ttl.max(Duration::from_millis(1)))
            .build();

        Self {
            pages,
            generation: Arc::new(AtomicU64::new(0)),
            enabled: !ttl.is_zero(),
        }
    }

    /// Read before querying the pages that are then passed to [`Self::insert`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn key(generation: u64, page: Option<&str>) -> (u64, String) {
        (generation, page.unwrap_or_default().to_owned())
    }

    pub async fn get(&self, page: Option<&str>) -> Option<String> {
        if !self.enabled {
            return None;
        }

        self.pages.get(&Self::key(self.generation(), page)).await
    }

    /// Stores a page rendered from data read at `generation`.
    pub async fn insert(&self, generation: u64, page: Option<&str>, html: String) {
        if !self.enabled {
            return;
        }

        if generation == self.generation() {
            self.pages.insert(Self::key(generation, page), html).await;
        } else {
            debug!(generation, "Not caching index page rendered before a write");
        }
    }

    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "Invalidating cached index pages");
        self.pages.invalidate_all();
    }
}

impl Debug for PageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("entries", &self.pages.entry_count())
            .field("generation", &self.generation())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::cache::PageCache;
    use std::time::Duration;

    #[tokio::test]
    async fn pages_are_cached_per_page_number() {
        let cache = PageCache::new(Duration::from_secs(20));
        let generation = cache.generation();
        cache.insert(generation, None, "first".to_owned()).await;
        cache.insert(generation, Some("2"), "second".to_owned()).await;

        assert_eq!(cache.get(None).await.as_deref(), Some("first"));
        assert_eq!(cache.get(Some("2")).await.as_deref(), Some("second"));
        assert_eq!(cache.get(Some("3")).await, None);
    }

    #[tokio::test]
    async fn invalidation_drops_everything() {
        let cache = PageCache::new(Duration::from_secs(20));
        let generation = cache.generation();
        cache.insert(generation, None, "first".to_owned()).await;
        cache.insert(generation, Some("2"), "second".to_owned()).await;

        cache.invalidate();

        assert_eq!(cache.get(None).await, None);
        assert_eq!(cache.get(Some("2")).await, None);
    }

    #[tokio::test]
    async fn pages_read_before_a_write_are_not_stored() {
        let cache = PageCache::new(Duration::from_secs(20));
        let read_at = cache.generation();

        cache.invalidate();
        cache.insert(read_at, None, "before the write".to_owned()).await;
        assert_eq!(cache.get(None).await, None);

        cache
            .insert(cache.generation(), None, "after the write".to_owned())
            .await;
        assert_eq!(cache.get(None).await.as_deref(), Some("after the write"));
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = PageCache::new(Duration::ZERO);
        cache.insert(cache.generation(), None, "first".to_owned()).await;

        assert_eq!(cache.get(None).await, None);
    }
}
