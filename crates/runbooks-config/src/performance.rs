//! The `performance.*` section (spec §6.3).

use serde::Deserialize;

use runbooks_router::DEFAULT_MAX_CONCURRENT_REQUESTS;

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PerformanceSection {
    pub max_concurrent_requests: usize,
    /// Fallback used when a `sources[]` entry omits its own `timeout_ms`.
    pub default_timeout_ms: u64,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}
