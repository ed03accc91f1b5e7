use std::time::Duration;

/// Local error type for this crate; converts into `runbooks_core::CoreError`
/// at the adapter boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError {
    #[error("rate limited on '{upstream}', retry after {retry_after:?}")]
    Exhausted {
        upstream: String,
        retry_after: Option<Duration>,
    },
}

impl From<RateLimiterError> for runbooks_core::CoreError {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::Exhausted {
                upstream,
                retry_after,
            } => runbooks_core::CoreError::RateLimited {
                adapter: upstream,
                reset_at: None,
                remaining_secs: retry_after.map(|d| d.as_secs()),
            },
        }
    }
}
