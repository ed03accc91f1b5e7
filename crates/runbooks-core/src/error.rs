//! Unified error taxonomy shared by every crate in the workspace.
//!
//! Mirrors the shape of `tower_resilience_core::ResilienceError<E>`: a single
//! enum that every adapter- and resilience-layer error converts into via
//! `From`, so callers never have to hand-write conversion glue when composing
//! an adapter behind a rate limiter behind a circuit breaker behind a cache.
//! Each variant corresponds to exactly one row of the error table in the
//! specification; `code()` returns the stable string used on the wire.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Result alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;

/// The full error taxonomy.
///
/// Recovery semantics for each variant are documented alongside the
/// corresponding row of the specification's error table; this type only
/// carries data, it does not itself decide whether to retry, skip, or
/// propagate — that policy lives in the caller (router, adapter, cache).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// A source could not be initialized because required configuration
    /// (secret env vars, malformed YAML) was missing or invalid. The
    /// offending adapter is refused; the rest of the federation starts.
    #[error("configuration error for adapter '{adapter}': {message}")]
    Config { adapter: String, message: String },

    /// Authentication with an upstream failed. Not retried; the adapter is
    /// marked unhealthy until `initialize` runs again.
    #[error("authentication failed for adapter '{adapter}': {message}")]
    Auth { adapter: String, message: String },

    /// The upstream's rate limit or quota was hit. `reset_at` is `None` when
    /// the upstream didn't advertise a reset time; in that case callers
    /// should treat the adapter's contribution as empty until the next
    /// call succeeds.
    #[error("rate limited on '{adapter}', resets in {remaining_secs:?}s")]
    RateLimited {
        adapter: String,
        reset_at: Option<Instant>,
        remaining_secs: Option<u64>,
    },

    /// A 4xx/5xx or network-level failure from an upstream. Counted by the
    /// circuit breaker; a single occurrence never fails the enclosing query.
    #[error("upstream error on '{adapter}': {message}")]
    Upstream { adapter: String, message: String },

    /// The outer deadline for an operation expired. Treated like `Upstream`
    /// plus a synthetic match reason so callers can tell the two apart.
    #[error("operation on '{adapter}' timed out after {elapsed:?}")]
    Timeout { adapter: String, elapsed: Duration },

    /// A payload exceeded the configured size cap and was skipped.
    #[error("payload too large ({size_bytes} bytes > cap {cap_bytes} bytes)")]
    PayloadTooLarge { size_bytes: u64, cap_bytes: u64 },

    /// A parse failure (base64, JSON, XML, front-matter). The affected
    /// payload is skipped; indexing continues.
    #[error("parse error in '{context}': {message}")]
    Parse { context: String, message: String },

    /// `refresh_index` was already running; this call is a no-op.
    #[error("index refresh already in progress for '{adapter}'")]
    IndexingBusy { adapter: String },

    /// The requested resource does not exist. `get_document` callers should
    /// translate this into `Ok(None)` rather than surfacing it.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A request was structurally invalid (over-length query, malformed
    /// filter). The caller should treat this as a stable 4xx-equivalent.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The circuit breaker for an upstream is open; the call was rejected
    /// without attempting any I/O.
    #[error("upstream '{adapter}' unavailable (circuit open)")]
    UpstreamUnavailable { adapter: String },

    /// A genuinely unexpected internal failure. This is the only variant
    /// that should ever propagate as an exception-like error all the way to
    /// a transport boundary; it always carries a correlation id for log
    /// correlation.
    #[error("internal error [{correlation_id}]: {message}")]
    Internal {
        correlation_id: Uuid,
        message: String,
    },
}

impl CoreError {
    /// The stable error code used in HTTP/tool-call error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config { .. } => "CONFIG",
            CoreError::Auth { .. } => "AUTH",
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::Upstream { .. } => "UPSTREAM",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            CoreError::Parse { .. } => "PARSE",
            CoreError::IndexingBusy { .. } => "INDEXING_BUSY",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation { .. } => "VALIDATION",
            CoreError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    /// Builds an `Internal` error, minting a fresh correlation id and logging
    /// it at `error!` so the id can be grepped back out of the logs.
    pub fn internal(message: impl Into<String>) -> Self {
        let correlation_id = Uuid::new_v4();
        let message = message.into();
        tracing::error!(%correlation_id, %message, "internal error");
        CoreError::Internal {
            correlation_id,
            message,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CoreError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(
            CoreError::Config {
                adapter: "fs".into(),
                message: "boom".into()
            }
            .code(),
            "CONFIG"
        );
        assert_eq!(
            CoreError::NotFound {
                what: "doc-1".into()
            }
            .code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn internal_carries_a_correlation_id() {
        match CoreError::internal("kaboom") {
            CoreError::Internal { correlation_id, .. } => {
                assert_ne!(correlation_id, Uuid::nil());
            }
            _ => panic!("expected Internal variant"),
        }
    }
}
