//! Two-tier cache (spec §4.C3).
//!
//! L1 is always present: a bounded in-process LRU map with per-entry TTL,
//! adapted from `tower-resilience-cache`'s `CacheStore`. L2 is optional and
//! remote (`redis`); every L2 round-trip is wrapped by its own
//! `runbooks-circuitbreaker::CircuitBreakerRegistry` so sustained L2 failure
//! degrades the whole cache to L1-only without the caller noticing.

pub mod config;
pub mod error;
pub mod events;
mod l2;
pub mod key;
mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use config::CacheConfig;
pub use error::CacheError;
pub use events::CacheEvent;
pub use key::{CacheKey, CacheKeyKind};

use l2::L2Client;
use runbooks_core::events::EventListeners;
use store::L1Store;

/// The two-tier cache itself. Cheaply `Clone`-able; every clone shares the
/// same L1 map and L2 connection.
#[derive(Clone)]
pub struct TwoTierCache {
    l1: Arc<Mutex<L1Store>>,
    l2: Option<Arc<L2Client>>,
    listeners: Arc<EventListeners<CacheEvent>>,
}

impl TwoTierCache {
    /// Builds the cache. Connecting to L2 (if configured) happens eagerly so
    /// a misconfigured `l2_url` surfaces at startup rather than on first
    /// request.
    pub async fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let l2 = match &config.l2_url {
            Some(url) => {
                let client = L2Client::connect(url, config.l2_breaker.clone())
                    .await
                    .map_err(|err| CacheError::L2Unavailable(err.to_string()))?;
                Some(Arc::new(client))
            }
            None => None,
        };

        Ok(Self {
            l1: Arc::new(Mutex::new(L1Store::new(config.l1_capacity))),
            l2,
            listeners: Arc::new(EventListeners::new()),
        })
    }

    /// L1-only cache, for adapters/tests that don't need a remote tier.
    pub fn l1_only(capacity: usize) -> Self {
        Self {
            l1: Arc::new(Mutex::new(L1Store::new(capacity))),
            l2: None,
            listeners: Arc::new(EventListeners::new()),
        }
    }

    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: runbooks_core::events::EventListener<CacheEvent> + 'static,
    {
        Arc::get_mut(&mut self.listeners)
            .expect("add_listener must be called before the cache is cloned/shared")
            .add(listener);
    }

    /// Read path (spec §4.C3): "L1 hit returns; else L2; on L2 hit backfill
    /// L1 asynchronously."
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let encoded = key.encoded();

        if let Some(value) = self.l1.lock().get(&encoded) {
            self.listeners.emit(&CacheEvent::L1Hit {
                key: encoded,
                timestamp: Instant::now(),
            });
            return serde_json::from_value(value).ok();
        }
        self.listeners.emit(&CacheEvent::L1Miss {
            key: encoded.clone(),
            timestamp: Instant::now(),
        });

        let l2 = self.l2.as_ref()?;
        let raw = l2.get(&encoded).await;
        let Some(raw) = raw else {
            self.listeners.emit(&CacheEvent::L2Miss {
                key: encoded,
                timestamp: Instant::now(),
            });
            return None;
        };
        self.listeners.emit(&CacheEvent::L2Hit {
            key: encoded.clone(),
            timestamp: Instant::now(),
        });

        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        let ttl = key.kind.default_ttl();
        let l1 = self.l1.clone();
        let backfill_key = encoded.clone();
        let backfill_value = value.clone();
        tokio::spawn(async move {
            l1.lock().insert(backfill_key, backfill_value, ttl);
        });

        serde_json::from_value(value).ok()
    }

    /// Write path (spec §4.C3): "set L2 first (fire-and-forget on failure),
    /// then L1."
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| key.kind.default_ttl());
        let encoded = key.encoded();

        let Ok(json_value) = serde_json::to_value(value) else {
            tracing::warn!(key = %encoded, "failed to serialize cache value, skipping write");
            return;
        };

        if let Some(l2) = &self.l2 {
            if let Ok(raw) = serde_json::to_string(&json_value) {
                let l2 = l2.clone();
                let l2_key = encoded.clone();
                tokio::spawn(async move {
                    l2.set(&l2_key, &raw, ttl).await;
                });
            }
        }

        self.l1.lock().insert(encoded, json_value, ttl);
    }

    /// Invalidation by exact key (spec §4.C3). "Cached entries are immutable;
    /// invalidation is delete-then-insert" (spec §3) — callers re-insert via
    /// `put` after this returns.
    pub async fn invalidate(&self, key: &CacheKey) {
        let encoded = key.encoded();
        self.l1.lock().remove(&encoded);
        if let Some(l2) = &self.l2 {
            l2.delete(&encoded).await;
        }
        self.listeners.emit(&CacheEvent::Invalidated {
            key: encoded,
            timestamp: Instant::now(),
        });
    }

    /// Invalidation by prefix scan within one kind (spec §4.C3).
    pub async fn invalidate_prefix(&self, kind: CacheKeyKind, prefix: &str) -> usize {
        let full_prefix = format!("{}:{}", kind.as_str(), prefix);
        let removed_l1 = self.l1.lock().remove_prefix(&full_prefix);
        let removed_l2 = if let Some(l2) = &self.l2 {
            l2.delete_prefix(&full_prefix).await
        } else {
            0
        };
        self.listeners.emit(&CacheEvent::Invalidated {
            key: full_prefix,
            timestamp: Instant::now(),
        });
        removed_l1.max(removed_l2)
    }

    /// `true` when the L2 breaker is open, i.e. the cache is running
    /// L1-only despite being configured with a remote tier.
    pub fn l2_degraded(&self) -> bool {
        self.l2.as_ref().is_some_and(|l2| l2.is_open())
    }

    pub fn l1_len(&self) -> usize {
        self.l1.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn l1_only_round_trips_a_value() {
        let cache = TwoTierCache::l1_only(10);
        let key = CacheKey::new(CacheKeyKind::Document, "doc-1");
        cache.put(&key, &"hello", None).await;
        let got: Option<String> = cache.get(&key).await;
        assert_eq!(got, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = TwoTierCache::l1_only(10);
        let key = CacheKey::new(CacheKeyKind::Document, "missing");
        let got: Option<String> = cache.get(&key).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn invalidate_removes_l1_entry() {
        let cache = TwoTierCache::l1_only(10);
        let key = CacheKey::new(CacheKeyKind::RunbookSearch, "q1");
        cache.put(&key, &42i32, None).await;
        cache.invalidate(&key).await;
        let got: Option<i32> = cache.get(&key).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn invalidate_prefix_drops_matching_keys_only() {
        let cache = TwoTierCache::l1_only(10);
        let k1 = CacheKey::new(CacheKeyKind::Document, "repo-a/readme");
        let k2 = CacheKey::new(CacheKeyKind::Document, "repo-a/other");
        let k3 = CacheKey::new(CacheKeyKind::Document, "repo-b/readme");
        cache.put(&k1, &1i32, None).await;
        cache.put(&k2, &2i32, None).await;
        cache.put(&k3, &3i32, None).await;

        let removed = cache
            .invalidate_prefix(CacheKeyKind::Document, "repo-a/")
            .await;
        assert_eq!(removed, 2);

        let got: Option<i32> = cache.get(&k3).await;
        assert_eq!(got, Some(3));
    }

    #[tokio::test]
    async fn l2_degraded_is_false_without_l2() {
        let cache = TwoTierCache::l1_only(10);
        assert!(!cache.l2_degraded());
    }
}
