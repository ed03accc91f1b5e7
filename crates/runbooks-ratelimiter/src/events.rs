use std::time::Instant;

use runbooks_core::events::Event;

/// Events emitted by [`crate::RateLimiterRegistry`], mirroring the
/// `tower_resilience` convention of a small per-crate event enum fanned out
/// through `runbooks_core::events::EventListeners`.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    CallPermitted { upstream: String, timestamp: Instant },
    CallThrottled { upstream: String, timestamp: Instant, waited_ms: u64 },
    CallRejected { upstream: String, timestamp: Instant },
}

impl Event for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::CallPermitted { .. } => "call_permitted",
            RateLimiterEvent::CallThrottled { .. } => "call_throttled",
            RateLimiterEvent::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::CallPermitted { timestamp, .. }
            | RateLimiterEvent::CallThrottled { timestamp, .. }
            | RateLimiterEvent::CallRejected { timestamp, .. } => *timestamp,
        }
    }
}
