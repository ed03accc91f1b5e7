//! The circuit state machine itself (spec §4.C2).
//!
//! Grounded on `tower_resilience_circuitbreaker::circuit::Circuit`: an
//! atomic state flag for lock-free reads, a sliding record of recent calls,
//! and `transition_to` as the single place state changes and events fire.
//! Unlike the teacher crate (which trips on a failure *rate* over a sized
//! window), this breaker implements the spec's simpler rule: CLOSED -> OPEN
//! once `failure_threshold` *consecutive* failures land within `window`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use runbooks_core::events::EventListeners;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    /// Timestamps of consecutive failures still inside `window`. Any
    /// success clears this (the streak is broken).
    recent_failures: VecDeque<Instant>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            last_state_change: Instant::now(),
            recent_failures: VecDeque::new(),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn state_handle(&self) -> Arc<AtomicU8> {
        self.state_atomic.clone()
    }

    /// `true` when the call may proceed. For `Open`, this also performs the
    /// OPEN -> HALF_OPEN transition once `cooldown` has elapsed.
    pub fn try_acquire(
        &mut self,
        config: &CircuitBreakerConfig,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false, // a probe is already in flight
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.cooldown {
                    self.transition_to(CircuitState::HalfOpen, config, listeners);
                    true
                } else {
                    listeners.emit(&CircuitBreakerEvent::CallRejected {
                        name: config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    false
                }
            }
        }
    }

    pub fn record_success(
        &mut self,
        config: &CircuitBreakerConfig,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            name: config.name.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });

        self.recent_failures.clear();

        if self.state == CircuitState::HalfOpen {
            self.transition_to(CircuitState::Closed, config, listeners);
        }
    }

    pub fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            name: config.name.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });

        if self.state == CircuitState::HalfOpen {
            self.transition_to(CircuitState::Open, config, listeners);
            return;
        }

        let now = Instant::now();
        self.recent_failures.push_back(now);
        while let Some(&oldest) = self.recent_failures.front() {
            if now.duration_since(oldest) > config.window {
                self.recent_failures.pop_front();
            } else {
                break;
            }
        }

        if self.recent_failures.len() as u32 >= config.failure_threshold {
            self.transition_to(CircuitState::Open, config, listeners);
        }
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        if self.state == state {
            return;
        }
        let from = self.state;
        listeners.emit(&CircuitBreakerEvent::StateTransition {
            name: config.name.clone(),
            timestamp: Instant::now(),
            from,
            to: state,
        });
        tracing::info!(circuit = %config.name, ?from, to = ?state, "circuit breaker state transition");

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.recent_failures.clear();
    }
}

/// Lock-free snapshot of a circuit's state, usable from a health-check path
/// without taking the breaker's internal lock.
pub fn read_state(handle: &AtomicU8) -> CircuitState {
    CircuitState::from_u8(handle.load(Ordering::Acquire))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listeners() -> EventListeners<CircuitBreakerEvent> {
        EventListeners::new()
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let config = CircuitBreakerConfig::new("svc").failure_threshold(3);
        let listeners = listeners();
        let mut circuit = Circuit::new();

        circuit.record_failure(&config, &listeners);
        circuit.record_failure(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Closed);
        circuit.record_failure(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[test]
    fn a_success_breaks_the_failure_streak() {
        let config = CircuitBreakerConfig::new("svc").failure_threshold(3);
        let listeners = listeners();
        let mut circuit = Circuit::new();

        circuit.record_failure(&config, &listeners);
        circuit.record_failure(&config, &listeners);
        circuit.record_success(&config, &listeners);
        circuit.record_failure(&config, &listeners);
        circuit.record_failure(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn rejects_calls_while_open_then_half_opens_after_cooldown() {
        let config = CircuitBreakerConfig::new("svc")
            .failure_threshold(1)
            .cooldown(Duration::from_millis(10));
        let listeners = listeners();
        let mut circuit = Circuit::new();

        circuit.record_failure(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.try_acquire(&config, &listeners));

        std::thread::sleep(Duration::from_millis(15));
        assert!(circuit.try_acquire(&config, &listeners));
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_on_single_success_and_reopens_on_single_failure() {
        let config = CircuitBreakerConfig::new("svc")
            .failure_threshold(1)
            .cooldown(Duration::from_millis(1));
        let listeners = listeners();
        let mut circuit = Circuit::new();

        circuit.record_failure(&config, &listeners);
        std::thread::sleep(Duration::from_millis(5));
        assert!(circuit.try_acquire(&config, &listeners));
        circuit.record_success(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Closed);

        circuit.record_failure(&config, &listeners);
        std::thread::sleep(Duration::from_millis(5));
        assert!(circuit.try_acquire(&config, &listeners));
        circuit.record_failure(&config, &listeners);
        assert_eq!(circuit.state(), CircuitState::Open);
    }
}
