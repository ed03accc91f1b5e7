//! L1 store: an in-process bounded LRU map with per-entry TTL, adapted from
//! `tower-resilience-cache`'s `CacheStore`/`LruStore` pair, narrowed to the
//! one eviction policy the federation needs and to a fixed `serde_json::Value`
//! payload so one store instance can hold every `CacheKeyKind`.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

#[derive(Clone, Debug)]
struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Not thread-safe on its own; callers (the `TwoTierCache`) hold it behind a
/// `parking_lot::Mutex`.
pub(crate) struct L1Store {
    cache: LruCache<String, CacheEntry>,
}

impl L1Store {
    pub(crate) fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            cache: LruCache::new(cap),
        }
    }

    /// Returns the value if present and not expired; removes it if expired.
    pub(crate) fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        let expired = matches!(self.cache.peek(key), Some(e) if e.is_expired());
        if expired {
            self.cache.pop(key);
            return None;
        }
        self.cache.get(key).map(|e| e.value.clone())
    }

    /// Inserts a value, returning the evicted entry's key (if the cache was
    /// full and the eviction target wasn't `key` itself).
    pub(crate) fn insert(&mut self, key: String, value: serde_json::Value, ttl: Duration) -> Option<String> {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        self.cache.push(key, entry).map(|(evicted_key, _)| evicted_key)
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.cache.pop(key);
    }

    /// Removes every key with the given prefix, returning how many were
    /// removed (spec §4.C3: "invalidation is by exact key or by prefix
    /// scan").
    pub(crate) fn remove_prefix(&mut self, prefix: &str) -> usize {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &matching {
            self.cache.pop(key);
        }
        matching.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn basic_get_insert() {
        let mut store = L1Store::new(2);
        store.insert("k1".into(), json!("v1"), Duration::from_secs(60));
        assert_eq!(store.get("k1"), Some(json!("v1")));
        assert_eq!(store.get("k2"), None);
    }

    #[test]
    fn lru_eviction_returns_evicted_key() {
        let mut store = L1Store::new(2);
        store.insert("k1".into(), json!(1), Duration::from_secs(60));
        store.insert("k2".into(), json!(2), Duration::from_secs(60));
        let evicted = store.insert("k3".into(), json!(3), Duration::from_secs(60));
        assert_eq!(evicted.as_deref(), Some("k1"));
        assert_eq!(store.get("k1"), None);
        assert_eq!(store.get("k3"), Some(json!(3)));
    }

    #[test]
    fn ttl_expiration() {
        let mut store = L1Store::new(10);
        store.insert("k1".into(), json!(1), Duration::from_millis(20));
        assert_eq!(store.get("k1"), Some(json!(1)));
        sleep(Duration::from_millis(40));
        assert_eq!(store.get("k1"), None);
    }

    #[test]
    fn remove_prefix_removes_only_matching_keys() {
        let mut store = L1Store::new(10);
        store.insert("document:a".into(), json!(1), Duration::from_secs(60));
        store.insert("document:b".into(), json!(2), Duration::from_secs(60));
        store.insert("procedure:a".into(), json!(3), Duration::from_secs(60));
        let removed = store.remove_prefix("document:");
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("procedure:a"), Some(json!(3)));
    }
}
