use std::time::Instant;

use runbooks_core::events::Event;

#[derive(Debug, Clone)]
pub enum CacheEvent {
    L1Hit { key: String, timestamp: Instant },
    L1Miss { key: String, timestamp: Instant },
    L2Hit { key: String, timestamp: Instant },
    L2Miss { key: String, timestamp: Instant },
    L2Unavailable { reason: String, timestamp: Instant },
    Evicted { key: String, timestamp: Instant },
    Invalidated { key: String, timestamp: Instant },
}

impl Event for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::L1Hit { .. } => "l1_hit",
            CacheEvent::L1Miss { .. } => "l1_miss",
            CacheEvent::L2Hit { .. } => "l2_hit",
            CacheEvent::L2Miss { .. } => "l2_miss",
            CacheEvent::L2Unavailable { .. } => "l2_unavailable",
            CacheEvent::Evicted { .. } => "evicted",
            CacheEvent::Invalidated { .. } => "invalidated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::L1Hit { timestamp, .. }
            | CacheEvent::L1Miss { timestamp, .. }
            | CacheEvent::L2Hit { timestamp, .. }
            | CacheEvent::L2Miss { timestamp, .. }
            | CacheEvent::L2Unavailable { timestamp, .. }
            | CacheEvent::Evicted { timestamp, .. }
            | CacheEvent::Invalidated { timestamp, .. } => *timestamp,
        }
    }
}
