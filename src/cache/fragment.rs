//! Rendered fragment cache.
//!
//! Engines cache expensive partial renders here under keys they derive
//! from the request. Development mode turns the cache into a counter of
//! misses so code changes are never masked.

use std::time::Duration;

use crate::cache::store::{CacheStats, TtlStore};
use crate::observability::metrics;

#[derive(Debug)]
pub struct FragmentCache {
    store: TtlStore<String>,
}

impl FragmentCache {
    /// Zero `max_entries` means 1000.
    pub fn new(dev_mode: bool, max_entries: usize) -> Self {
        Self {
            store: TtlStore::new(max_entries, dev_mode),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.store.get(key);
        metrics::record_cache_lookup("fragment", value.is_some());
        value
    }

    /// Cache `html` for `ttl`. Zero TTL stores nothing.
    pub fn set(&self, key: impl Into<String>, html: impl Into<String>, ttl: Duration) {
        let html = html.into();
        let size = html.len();
        self.store.insert(key, html, ttl, size);
    }

    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.store.remove_prefix(prefix)
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.store.set_disabled(disabled);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_hit_and_miss() {
        let cache = FragmentCache::new(false, 10);
        assert_eq!(cache.get("nav"), None);
        cache.set("nav", "<nav></nav>", TTL);
        assert_eq!(cache.get("nav").as_deref(), Some("<nav></nav>"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_eq!(stats.size_bytes, "<nav></nav>".len());
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = FragmentCache::new(false, 10);
        cache.set("k", "v", Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_zero_ttl_never_retrievable() {
        let cache = FragmentCache::new(false, 10);
        cache.set("k", "v", Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dev_mode_disabled() {
        let cache = FragmentCache::new(true, 10);
        cache.set("k", "v", TTL);
        assert_eq!(cache.get("k"), None);
        assert!(cache.stats().disabled);
    }

    #[test]
    fn test_invalidate() {
        let cache = FragmentCache::new(false, 10);
        cache.set("users/list", "a", TTL);
        cache.set("users/1", "b", TTL);
        cache.set("posts/1", "c", TTL);

        cache.invalidate("posts/1");
        assert_eq!(cache.get("posts/1"), None);
        assert_eq!(cache.invalidate_prefix("users/"), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = FragmentCache::new(false, 50);
        for i in 0..500 {
            cache.set(format!("k{i}"), "x", TTL);
        }
        assert!(cache.len() <= 50);
    }
}
