//! Bounded TTL store shared by the fragment and response caches.
//!
//! # Design Decisions
//! - Reader/writer lock around the map; hit/miss counters are atomics
//!   outside the lock so reads never serialize on counter updates
//! - Expired entries are purged lazily on read and when an insert finds
//!   the store full
//! - At capacity, entries expiring soonest are evicted first. This is TTL
//!   order, not access recency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Capacity used when zero is requested.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub expires_at: Instant,
    /// Approximate size in bytes, for stats only.
    pub size: usize,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub size_bytes: usize,
    pub disabled: bool,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100); 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

#[derive(Debug)]
pub struct TtlStore<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    disabled: AtomicBool,
}

impl<V: Clone> TtlStore<V> {
    pub fn new(max_entries: usize, disabled: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: if max_entries == 0 {
                DEFAULT_MAX_ENTRIES
            } else {
                max_entries
            },
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disabled: AtomicBool::new(disabled),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Unexpired value for `key`. Counts a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if self.is_disabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let now = Instant::now();
        let found = {
            let entries = self.entries.read().expect("cache lock poisoned");
            entries
                .get(key)
                .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()))
        };

        match found {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                let mut entries = self.entries.write().expect("cache lock poisoned");
                // Re-check: another writer may have refreshed the entry.
                if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                    entries.remove(key);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `value` for `ttl`. A zero TTL or a disabled store stores nothing.
    ///
    /// Returns whether the value was stored.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration, size: usize) -> bool {
        if ttl.is_zero() || self.is_disabled() {
            return false;
        }

        let now = Instant::now();
        let key = key.into();
        let entry = Entry {
            value,
            expires_at: now + ttl,
            size,
        };

        let mut entries = self.entries.write().expect("cache lock poisoned");
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| !e.is_expired(now));
            if entries.len() >= self.max_entries {
                evict_soonest(&mut entries, (self.max_entries / 10).max(1));
            }
        }
        entries.insert(key, entry);
        true
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key)
            .is_some()
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    /// Remove expired entries. Returns the number removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, size_bytes) = {
            let entries = self.entries.read().expect("cache lock poisoned");
            (entries.len(), entries.values().map(|e| e.size).sum())
        };
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size_bytes,
            disabled: self.is_disabled(),
        }
    }
}

fn evict_soonest<V>(entries: &mut HashMap<String, Entry<V>>, count: usize) {
    let mut candidates: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.expires_at, key.clone()))
        .collect();
    candidates.sort_unstable();
    for (_, key) in candidates.into_iter().take(count) {
        entries.remove(&key);
    }
}
