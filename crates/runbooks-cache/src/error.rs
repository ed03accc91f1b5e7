#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache value failed to (de)serialize: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("L2 cache unavailable: {0}")]
    L2Unavailable(String),
}

impl From<CacheError> for runbooks_core::CoreError {
    fn from(err: CacheError) -> Self {
        runbooks_core::CoreError::internal(err.to_string())
    }
}
