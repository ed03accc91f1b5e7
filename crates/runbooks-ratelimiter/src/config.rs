use std::time::Duration;

/// Per-upstream rate-limiter configuration (spec §4.C1).
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Minimum spacing between two outbound calls to this upstream.
    pub min_interval: Duration,
    /// Conservative hourly cap, normally derived as a percentage of the
    /// upstream's advertised hourly limit (see [`RateLimiterConfig::from_advertised_limit`]).
    pub hourly_quota: u64,
    /// Calls are refused once `remaining < safety_buffer` and `reset_at` is
    /// still in the future, even if `hourly_quota` hasn't been hit yet.
    pub safety_buffer: u64,
}

impl RateLimiterConfig {
    /// Derives a quota as `percentage` of `advertised_hourly_limit`, per the
    /// spec's "conservative hourly quota derived as a configurable
    /// percentage of the upstream's advertised hourly limit".
    pub fn from_advertised_limit(
        advertised_hourly_limit: u64,
        percentage: f64,
        min_interval: Duration,
        safety_buffer: u64,
    ) -> Self {
        let hourly_quota = ((advertised_hourly_limit as f64) * percentage.clamp(0.0, 1.0)) as u64;
        Self {
            min_interval,
            hourly_quota: hourly_quota.max(1),
            safety_buffer,
        }
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            hourly_quota: 1000,
            safety_buffer: 5,
        }
    }
}
