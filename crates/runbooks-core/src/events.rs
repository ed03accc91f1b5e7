//! A small, generic event-listener facility shared by the resilience crates.
//!
//! `runbooks-ratelimiter`, `runbooks-circuitbreaker` and `runbooks-cache` each
//! define their own event enum (state transitions, evictions, throttles) and
//! reuse [`EventListeners`] to fan those events out to zero or more
//! subscribers — typically a `tracing` bridge installed by `runbooks-server`,
//! but tests can install their own listener to assert on transition order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Marker trait for an event type emitted by a resilience layer.
pub trait Event: Send + Sync + fmt::Debug {
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> Instant;
}

/// Something that wants to observe events of type `E`.
pub trait EventListener<E: Event>: Send + Sync {
    fn on_event(&self, event: &E);
}

type BoxedListener<E> = Arc<dyn EventListener<E>>;

/// A fan-out collection of listeners for a single event type.
#[derive(Clone)]
pub struct EventListeners<E: Event> {
    listeners: Vec<BoxedListener<E>>,
}

impl<E: Event> Default for EventListeners<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<E: Event> EventListeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits `event` to every registered listener. A panicking listener is
    /// caught and logged so it cannot take down the caller's in-flight
    /// request; the remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if result.is_err() {
                tracing::warn!(event_type = event.event_type(), "event listener panicked");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Listener that forwards every event to `tracing` at `debug` level. Used as
/// the default listener installed by `runbooks-server` so state transitions
/// always show up in logs even with no application-specific listener wired
/// up.
pub struct TracingBridge;

impl<E: Event> EventListener<E> for TracingBridge {
    fn on_event(&self, event: &E) {
        tracing::debug!(event_type = event.event_type(), ?event, "resilience event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping;

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "ping"
        }
        fn timestamp(&self) -> Instant {
            Instant::now()
        }
    }

    struct Counter(Arc<AtomicUsize>);
    impl EventListener<Ping> for Counter {
        fn on_event(&self, _event: &Ping) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicky;
    impl EventListener<Ping> for Panicky {
        fn on_event(&self, _event: &Ping) {
            panic!("boom");
        }
    }

    #[test]
    fn emits_to_all_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        listeners.add(Counter(count.clone()));
        listeners.add(Counter(count.clone()));
        listeners.emit(&Ping);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_panicking_listener_does_not_stop_the_others() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        listeners.add(Panicky);
        listeners.add(Counter(count.clone()));
        listeners.emit(&Ping);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
