//! Local error plumbing for the adapter implementations. Each adapter maps
//! these into `runbooks_core::CoreError` at its public-API boundary so the
//! `SourceAdapter` trait only ever has to deal with one error type.

use runbooks_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("missing required environment variable '{0}'")]
    MissingEnv(String),

    #[error("{0}")]
    Other(String),
}

/// Maps an adapter-internal error into the shared taxonomy. `adapter` names
/// the owning adapter instance, since `CoreError` carries that for every
/// upstream-facing variant.
pub fn into_core_error(adapter: &str, err: AdapterError) -> CoreError {
    match err {
        AdapterError::Io(e) => CoreError::Upstream {
            adapter: adapter.to_string(),
            message: e.to_string(),
        },
        AdapterError::Http(e) => {
            if e.is_timeout() {
                CoreError::Timeout {
                    adapter: adapter.to_string(),
                    elapsed: std::time::Duration::default(),
                }
            } else {
                CoreError::Upstream {
                    adapter: adapter.to_string(),
                    message: e.to_string(),
                }
            }
        }
        AdapterError::Base64(e) => CoreError::Parse {
            context: adapter.to_string(),
            message: e.to_string(),
        },
        AdapterError::Watch(e) => CoreError::Upstream {
            adapter: adapter.to_string(),
            message: e.to_string(),
        },
        AdapterError::MissingEnv(var) => CoreError::Config {
            adapter: adapter.to_string(),
            message: format!("missing required environment variable '{var}'"),
        },
        AdapterError::Other(message) => CoreError::Upstream {
            adapter: adapter.to_string(),
            message,
        },
    }
}
