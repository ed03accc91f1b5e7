//! Per-upstream limiter state machine (spec §4.C1).
//!
//! Each upstream gets one [`UpstreamLimiter`] tracking the fields the spec
//! names verbatim: `remaining`, `reset_at`, `last_request_at`,
//! `hourly_count`, `hour_start`, `min_interval`, `quota`. The limiter is
//! consulted before every outbound call (`before_call`) and updated after
//! every response (`after_call`) or rate-limit rejection
//! (`record_exhaustion`).

use std::time::{Duration, Instant};

use crate::config::RateLimiterConfig;
use crate::error::RateLimiterError;

/// Response headers an upstream may report about its own rate limiting.
/// Adapters fill this in from whatever headers the upstream actually sends
/// (e.g. `X-RateLimit-Remaining` / `X-RateLimit-Reset`); absent fields are
/// simply not updated.
#[derive(Debug, Clone, Default)]
pub struct RateLimitHeaders {
    pub remaining: Option<u64>,
    pub reset_at: Option<Instant>,
}

#[derive(Debug)]
pub struct UpstreamLimiter {
    config: RateLimiterConfig,
    remaining: Option<u64>,
    reset_at: Option<Instant>,
    last_request_at: Option<Instant>,
    hourly_count: u64,
    hour_start: Instant,
}

impl UpstreamLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            remaining: None,
            reset_at: None,
            last_request_at: None,
            hourly_count: 0,
            hour_start: Instant::now(),
        }
    }

    fn roll_hour_window_if_elapsed(&mut self, now: Instant) {
        if now.duration_since(self.hour_start) >= Duration::from_secs(3600) {
            self.hour_start = now;
            self.hourly_count = 0;
        }
    }

    /// How long the caller must sleep before issuing the call, or an error
    /// if the call should be refused outright. Does not itself sleep; call
    /// [`UpstreamLimiter::acquire`] for that.
    pub fn check(&mut self, upstream: &str) -> Result<Duration, RateLimiterError> {
        let now = Instant::now();
        self.roll_hour_window_if_elapsed(now);

        let hour_window_active = now.duration_since(self.hour_start) < Duration::from_secs(3600);
        if self.hourly_count >= self.config.hourly_quota && hour_window_active {
            return Err(RateLimiterError::Exhausted {
                upstream: upstream.to_string(),
                retry_after: self
                    .reset_at
                    .map(|r| r.saturating_duration_since(now))
                    .or(Some(Duration::from_secs(3600) - now.duration_since(self.hour_start))),
            });
        }

        if let (Some(remaining), Some(reset_at)) = (self.remaining, self.reset_at) {
            if remaining < self.config.safety_buffer && reset_at > now {
                return Err(RateLimiterError::Exhausted {
                    upstream: upstream.to_string(),
                    retry_after: Some(reset_at.saturating_duration_since(now)),
                });
            }
        }

        let wait = match self.last_request_at {
            Some(last) => {
                let earliest = last + self.config.min_interval;
                earliest.saturating_duration_since(now)
            }
            None => Duration::ZERO,
        };
        Ok(wait)
    }

    /// Blocks (via `tokio::time::sleep`) until the minimum interval has
    /// elapsed, then records the call as having happened. Call this
    /// immediately before making the outbound request.
    pub async fn acquire(&mut self, upstream: &str) -> Result<(), RateLimiterError> {
        let wait = self.check(upstream)?;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        let now = Instant::now();
        self.roll_hour_window_if_elapsed(now);
        self.hourly_count += 1;
        self.last_request_at = Some(now);
        Ok(())
    }

    /// Updates limiter state from a successful response's rate-limit
    /// headers, when the upstream reports them.
    pub fn after_call(&mut self, headers: RateLimitHeaders) {
        if let Some(remaining) = headers.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_at) = headers.reset_at {
            self.reset_at = Some(reset_at);
        }
    }

    /// Records a 403/429 whose headers indicate exhaustion: remaining drops
    /// to zero and `reset_at` is updated, per spec §4.C1.
    pub fn record_exhaustion(&mut self, reset_at: Option<Instant>) {
        self.remaining = Some(0);
        if reset_at.is_some() {
            self.reset_at = reset_at;
        }
    }

    pub fn hourly_count(&self) -> u64 {
        self.hourly_count
    }

    pub fn quota(&self) -> u64 {
        self.config.hourly_quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_spaces_calls_by_min_interval() {
        let mut limiter = UpstreamLimiter::new(RateLimiterConfig {
            min_interval: Duration::from_millis(20),
            hourly_quota: 1000,
            safety_buffer: 0,
        });

        let start = Instant::now();
        limiter.acquire("up").await.unwrap();
        limiter.acquire("up").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn hourly_quota_is_enforced() {
        let mut limiter = UpstreamLimiter::new(RateLimiterConfig {
            min_interval: Duration::from_millis(0),
            hourly_quota: 2,
            safety_buffer: 0,
        });

        limiter.acquire("up").await.unwrap();
        limiter.acquire("up").await.unwrap();
        let err = limiter.acquire("up").await.unwrap_err();
        assert!(matches!(err, RateLimiterError::Exhausted { .. }));
    }

    #[test]
    fn safety_buffer_blocks_calls_before_reset() {
        let mut limiter = UpstreamLimiter::new(RateLimiterConfig {
            min_interval: Duration::from_millis(0),
            hourly_quota: 1000,
            safety_buffer: 5,
        });
        limiter.after_call(RateLimitHeaders {
            remaining: Some(2),
            reset_at: Some(Instant::now() + Duration::from_secs(60)),
        });
        let err = limiter.check("up").unwrap_err();
        assert!(matches!(err, RateLimiterError::Exhausted { .. }));
    }

    #[test]
    fn record_exhaustion_zeroes_remaining() {
        let mut limiter = UpstreamLimiter::new(RateLimiterConfig::default());
        limiter.record_exhaustion(Some(Instant::now() + Duration::from_secs(10)));
        assert_eq!(limiter.remaining, Some(0));
    }
}
