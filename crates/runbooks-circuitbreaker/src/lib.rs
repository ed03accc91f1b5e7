//! Circuit breaker (spec §4.C2).
//!
//! Two ways to use a breaker, matching the two call shapes the federation
//! needs:
//!
//! - [`CircuitBreakerRegistry::call`] wraps a single async call by upstream
//!   name — what the filesystem/wiki/forge/http adapters use directly, and
//!   what `runbooks-cache` uses to guard its L2 round-trip.
//! - [`layer::CircuitBreakerLayer`] wraps a `tower::Service` — for composing
//!   into a `ServiceBuilder` stack the way `axum-resilient-kv-store` does.

pub mod circuit;
pub mod config;
pub mod error;
pub mod events;
pub mod layer;

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use runbooks_core::events::EventListeners;

use circuit::Circuit;
pub use circuit::CircuitState;
pub use config::CircuitBreakerConfig;
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

/// Registry of named breakers, one per upstream (spec §4.C2: "Named
/// breakers are keyed per upstream; state is process-local").
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    circuits: Arc<DashMap<String, Arc<Mutex<Circuit>>>>,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            circuits: Arc::new(DashMap::new()),
            listeners: Arc::new(EventListeners::new()),
        }
    }

    fn circuit_for(&self, name: &str) -> Arc<Mutex<Circuit>> {
        self.circuits
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Circuit::new())))
            .clone()
    }

    pub fn state(&self, name: &str) -> CircuitState {
        self.circuit_for(name).lock().state()
    }

    /// Runs `f` if the named breaker permits it; records the outcome.
    /// Returns `CircuitBreakerError::Open` without calling `f` at all when
    /// the breaker is open, so a caller in that state never attempts I/O.
    pub async fn call<F, Fut, T, E>(
        &self,
        name: &str,
        config: &CircuitBreakerConfig,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let circuit = self.circuit_for(name);

        let permitted = circuit.lock().try_acquire(config, &self.listeners);
        if !permitted {
            return Err(CircuitBreakerError::Open {
                name: name.to_string(),
            });
        }

        match f().await {
            Ok(value) => {
                circuit.lock().record_success(config, &self.listeners);
                Ok(value)
            }
            Err(err) => {
                circuit.lock().record_failure(config, &self.listeners);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: runbooks_core::events::EventListener<CircuitBreakerEvent> + 'static,
    {
        Arc::get_mut(&mut self.listeners)
            .expect("add_listener must be called before the registry is cloned/shared")
            .add(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_circuit_rejects_without_calling_inner() {
        let registry = CircuitBreakerRegistry::new();
        let config = CircuitBreakerConfig::new("svc").failure_threshold(1);

        let result: Result<(), CircuitBreakerError<&str>> = registry
            .call("svc", &config, || async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert_eq!(registry.state("svc"), CircuitState::Open);

        let mut called = false;
        let _ = registry
            .call::<_, _, (), &str>("svc", &config, || {
                called = true;
                async { Ok(()) }
            })
            .await;
        assert!(!called, "circuit was open, inner call must not run");
    }
}
