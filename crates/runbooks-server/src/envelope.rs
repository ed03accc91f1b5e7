//! Canonical HTTP envelopes (spec §6.2): every `/api/*` response is either a
//! [`SuccessEnvelope`] or an [`ErrorEnvelope`], never a bare payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use runbooks_core::CoreError;

#[derive(Debug, Clone, Serialize, Default)]
pub struct ResponseMetadata {
    pub retrieval_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: ResponseMetadata,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn new(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data,
            metadata,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for SuccessEnvelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEnvelope {
    pub fn from_core_error(err: &CoreError) -> (StatusCode, Self) {
        let status = match err {
            CoreError::Auth { .. } => StatusCode::UNAUTHORIZED,
            CoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::Validation { .. } | CoreError::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Config { .. } | CoreError::Parse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::IndexingBusy { .. } => StatusCode::CONFLICT,
            CoreError::Upstream { .. } | CoreError::UpstreamUnavailable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            CoreError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let envelope = Self {
            success: false,
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
                details: None,
            },
            timestamp: Utc::now(),
        };
        (status, envelope)
    }
}

/// Lets handlers `return Err(core_error)` directly and get a well-formed
/// error envelope on the wire.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, envelope) = ErrorEnvelope::from_core_error(&self.0);
        (status, axum::Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = CoreError::NotFound {
            what: "runbook".to_string(),
        };
        let (status, envelope) = ErrorEnvelope::from_core_error(&err);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(envelope.error.code, "NOT_FOUND");
        assert!(!envelope.success);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = CoreError::RateLimited {
            adapter: "wiki".to_string(),
            reset_at: None,
            remaining_secs: None,
        };
        let (status, _) = ErrorEnvelope::from_core_error(&err);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
