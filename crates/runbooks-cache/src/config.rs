use std::time::Duration;

use runbooks_circuitbreaker::CircuitBreakerConfig;

/// "Critical content (runbooks) 1h" tier (spec §4.C3).
pub const CRITICAL_TTL: Duration = Duration::from_secs(3600);
/// "Generic knowledge 4h" tier.
pub const KNOWLEDGE_TTL: Duration = Duration::from_secs(4 * 3600);
/// "Metadata 24h" tier — used for adapter/document metadata-only entries,
/// which sit outside the six `CacheKeyKind`s but share the same store.
pub const METADATA_TTL: Duration = Duration::from_secs(24 * 3600);

/// Configuration for a [`crate::TwoTierCache`] (spec §4.C3).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bounded L1 entry count.
    pub l1_capacity: usize,
    /// `redis://` URL for the optional L2 tier. `None` disables L2 entirely
    /// and the cache behaves as L1-only.
    pub l2_url: Option<String>,
    /// Breaker guarding every L2 round-trip; sustained L2 failure opens this
    /// breaker and the cache degrades transparently to L1-only.
    pub l2_breaker: CircuitBreakerConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 10_000,
            l2_url: None,
            l2_breaker: CircuitBreakerConfig::new("cache-l2")
                .failure_threshold(3)
                .window(Duration::from_secs(30))
                .cooldown(Duration::from_secs(20)),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn l1_capacity(mut self, capacity: usize) -> Self {
        self.l1_capacity = capacity;
        self
    }

    pub fn l2_url(mut self, url: impl Into<String>) -> Self {
        self.l2_url = Some(url.into());
        self
    }
}
