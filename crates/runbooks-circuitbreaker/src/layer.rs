//! A `tower::Layer`/`Service` wrapper, for composing the breaker directly
//! into a `ServiceBuilder` stack around a `reqwest`-backed client — the same
//! shape `CircuitBreakerLayer` takes in the teacher crate, narrowed to a
//! single failure classifier (`Err` is a failure) since the spec doesn't
//! call for pluggable classification.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tower_layer::Layer;
use tower_service::Service;

use crate::circuit::Circuit;
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
use runbooks_core::events::EventListeners;

#[derive(Clone)]
pub struct CircuitBreakerLayer {
    config: Arc<CircuitBreakerConfig>,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl CircuitBreakerLayer {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            listeners: Arc::new(EventListeners::new()),
        }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            circuit: Arc::new(Mutex::new(Circuit::new())),
            config: self.config.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    circuit: Arc<Mutex<Circuit>>,
    config: Arc<CircuitBreakerConfig>,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req>,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display + Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let circuit = self.circuit.clone();
        let config = self.config.clone();
        let listeners = self.listeners.clone();

        let permitted = circuit.lock().try_acquire(&config, &listeners);
        if !permitted {
            let name = config.name.clone();
            return Box::pin(async move { Err(CircuitBreakerError::Open { name }) });
        }

        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(resp) => {
                    circuit.lock().record_success(&config, &listeners);
                    Ok(resp)
                }
                Err(err) => {
                    circuit.lock().record_failure(&config, &listeners);
                    Err(CircuitBreakerError::Inner(err))
                }
            }
        })
    }
}
