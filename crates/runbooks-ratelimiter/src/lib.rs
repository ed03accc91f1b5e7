//! Rate limiter & quota guard (spec §4.C1).
//!
//! Owns one [`limiter::UpstreamLimiter`] per upstream name behind a
//! [`dashmap::DashMap`] so adapters sharing the same process never contend on
//! a single global lock; each upstream's own state is protected by a
//! `tokio::sync::Mutex` since `acquire` sleeps.

pub mod config;
pub mod error;
pub mod events;
pub mod limiter;

use std::sync::Arc;

use dashmap::DashMap;
use runbooks_core::events::EventListeners;
use tokio::sync::Mutex;

pub use config::RateLimiterConfig;
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use limiter::{RateLimitHeaders, UpstreamLimiter};

/// Registry of per-upstream rate limiters, shared across the whole adapter
/// registry (spec §5: "C1 and C2 state are owned per upstream; updates
/// under a per-upstream lock").
#[derive(Clone)]
pub struct RateLimiterRegistry {
    limiters: Arc<DashMap<String, Arc<Mutex<UpstreamLimiter>>>>,
    listeners: Arc<EventListeners<RateLimiterEvent>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self {
            limiters: Arc::new(DashMap::new()),
            listeners: Arc::new(EventListeners::new()),
        }
    }

    fn limiter_for(&self, upstream: &str, config: &RateLimiterConfig) -> Arc<Mutex<UpstreamLimiter>> {
        self.limiters
            .entry(upstream.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(UpstreamLimiter::new(config.clone()))))
            .clone()
    }

    /// Waits (if needed) and then reserves a permit for a call to
    /// `upstream`. Returns `Err` immediately, without sleeping, if the
    /// hourly quota or safety buffer has been exhausted.
    pub async fn acquire(
        &self,
        upstream: &str,
        config: &RateLimiterConfig,
    ) -> Result<(), RateLimiterError> {
        let limiter = self.limiter_for(upstream, config);
        let mut guard = limiter.lock().await;
        let now = std::time::Instant::now();
        match guard.acquire(upstream).await {
            Ok(()) => {
                self.listeners.emit(&RateLimiterEvent::CallPermitted {
                    upstream: upstream.to_string(),
                    timestamp: now,
                });
                Ok(())
            }
            Err(err) => {
                self.listeners.emit(&RateLimiterEvent::CallRejected {
                    upstream: upstream.to_string(),
                    timestamp: now,
                });
                Err(err)
            }
        }
    }

    pub async fn report_headers(&self, upstream: &str, headers: RateLimitHeaders) {
        if let Some(limiter) = self.limiters.get(upstream) {
            limiter.lock().await.after_call(headers);
        }
    }

    pub async fn report_exhaustion(&self, upstream: &str, reset_at: Option<std::time::Instant>) {
        if let Some(limiter) = self.limiters.get(upstream) {
            limiter.lock().await.record_exhaustion(reset_at);
        }
    }

    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: runbooks_core::events::EventListener<RateLimiterEvent> + 'static,
    {
        Arc::get_mut(&mut self.listeners)
            .expect("add_listener must be called before the registry is cloned/shared")
            .add(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn independent_upstreams_do_not_share_quota() {
        let registry = RateLimiterRegistry::new();
        let cfg = RateLimiterConfig {
            min_interval: Duration::ZERO,
            hourly_quota: 1,
            safety_buffer: 0,
        };
        registry.acquire("a", &cfg).await.unwrap();
        // "b" has its own independent quota, so this must still succeed.
        registry.acquire("b", &cfg).await.unwrap();
        // "a" is now exhausted.
        assert!(registry.acquire("a", &cfg).await.is_err());
    }
}
