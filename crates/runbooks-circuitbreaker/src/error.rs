#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    #[error(transparent)]
    Inner(#[from] E),
}

impl<E: std::fmt::Display> From<CircuitBreakerError<E>> for runbooks_core::CoreError {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open { name } => {
                runbooks_core::CoreError::UpstreamUnavailable { adapter: name }
            }
            CircuitBreakerError::Inner(inner) => runbooks_core::CoreError::Upstream {
                adapter: "unknown".to_string(),
                message: inner.to_string(),
            },
        }
    }
}
