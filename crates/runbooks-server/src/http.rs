//! The `/api/*` HTTP mirror of the tool surface (spec §6.2), grounded on
//! `axum-resilient-kv-store`'s `Router::new().route(...).with_state(...)`
//! shape.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use runbooks_core::Filters;

use crate::envelope::{ApiError, ResponseMetadata, SuccessEnvelope};
use crate::lookup;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search_knowledge_base))
        .route("/api/runbooks/search", post(search_runbooks))
        .route("/api/runbooks", get(list_runbooks))
        .route("/api/runbooks/:id", get(get_runbook))
        .route("/api/decision-tree", post(decision_tree))
        .route("/api/procedures/:id", get(get_procedure))
        .route("/api/escalation", post(escalation))
        .route("/api/sources", get(list_sources))
        .route("/api/feedback", post(record_feedback))
        .route("/health", get(health))
        .route("/performance", get(performance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    max_results: Option<usize>,
}

async fn search_knowledge_base(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<SuccessEnvelope<Vec<runbooks_core::SearchResult>>, ApiError> {
    let filters = Filters {
        limit: req.max_results,
        confidence_threshold: None,
        categories: req.categories,
        max_age_days: None,
    };
    let started = Instant::now();
    let results = state.registry.search(&req.query, &filters).await;
    let metadata = ResponseMetadata {
        retrieval_time_ms: started.elapsed().as_millis() as u64,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(results, metadata))
}

#[derive(Debug, Deserialize)]
struct RunbookSearchRequest {
    alert_type: String,
    severity: String,
    #[serde(default)]
    affected_systems: Vec<String>,
    #[serde(default)]
    ctx: Option<String>,
}

async fn search_runbooks(
    State(state): State<AppState>,
    Json(req): Json<RunbookSearchRequest>,
) -> Result<SuccessEnvelope<Vec<runbooks_core::Runbook>>, ApiError> {
    let outcome = state
        .registry
        .search_runbooks(&req.alert_type, &req.severity, &req.affected_systems, req.ctx.as_deref())
        .await;
    let metadata = ResponseMetadata {
        retrieval_time_ms: outcome.retrieval_time_ms,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(outcome.runbooks, metadata))
}

/// `GET /runbooks`: a broad, unfiltered runbook search, for dashboards that
/// want "whatever the federation currently has" rather than a targeted
/// alert-driven query.
async fn list_runbooks(
    State(state): State<AppState>,
) -> Result<SuccessEnvelope<Vec<runbooks_core::Runbook>>, ApiError> {
    let outcome = state.registry.search_runbooks("", "info", &[], None).await;
    let metadata = ResponseMetadata {
        retrieval_time_ms: outcome.retrieval_time_ms,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(outcome.runbooks, metadata))
}

/// `GET /runbooks/{id}`: `{id}` is interpreted as `{source}/{document id}`,
/// the only address space C8's `get_document` understands.
async fn get_runbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<SuccessEnvelope<runbooks_core::SearchResult>, ApiError> {
    let Some((source, doc_id)) = id.split_once('/') else {
        return Err(runbooks_core::CoreError::Validation {
            message: "runbook id must be '{source}/{document_id}'".to_string(),
        }
        .into());
    };

    let result = state
        .registry
        .get_document(source, doc_id)
        .await?
        .ok_or_else(|| runbooks_core::CoreError::NotFound {
            what: format!("runbook '{id}'"),
        })?;

    let metadata = ResponseMetadata {
        retrieval_time_ms: result.retrieval_time_ms,
        confidence_score: Some(result.confidence_score),
        source: Some(result.document.source.clone()),
        cached: false,
    };
    Ok(SuccessEnvelope::new(result, metadata))
}

#[derive(Debug, Deserialize)]
struct DecisionTreeRequest {
    alert_context: String,
}

async fn decision_tree(
    State(state): State<AppState>,
    Json(req): Json<DecisionTreeRequest>,
) -> Result<SuccessEnvelope<runbooks_core::DecisionTree>, ApiError> {
    let (tree, retrieval_time_ms) = lookup::decision_tree_for(&state.registry, &req.alert_context).await?;
    let metadata = ResponseMetadata {
        retrieval_time_ms,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(tree, metadata))
}

async fn get_procedure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<SuccessEnvelope<runbooks_core::Procedure>, ApiError> {
    let (procedure, retrieval_time_ms) = lookup::procedure_by_id(&state.registry, &id).await?;
    let metadata = ResponseMetadata {
        retrieval_time_ms,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(procedure, metadata))
}

#[derive(Debug, Deserialize)]
struct EscalationRequest {
    severity: String,
    #[serde(default)]
    business_hours: bool,
}

async fn escalation(
    State(state): State<AppState>,
    Json(req): Json<EscalationRequest>,
) -> Result<SuccessEnvelope<lookup::EscalationPath>, ApiError> {
    let (path, retrieval_time_ms) =
        lookup::escalation_path_for(&state.registry, &req.severity, req.business_hours).await?;
    let metadata = ResponseMetadata {
        retrieval_time_ms,
        cached: false,
        ..Default::default()
    };
    Ok(SuccessEnvelope::new(path, metadata))
}

async fn list_sources(
    State(state): State<AppState>,
) -> SuccessEnvelope<Vec<runbooks_core::AdapterMetadata>> {
    let started = Instant::now();
    let sources = state.registry.list_sources().await;
    SuccessEnvelope::new(
        sources,
        ResponseMetadata {
            retrieval_time_ms: started.elapsed().as_millis() as u64,
            cached: false,
            ..Default::default()
        },
    )
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    runbook_id: String,
    outcome: String,
    timing_ms: u64,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct FeedbackAccepted {
    accepted: bool,
}

async fn record_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> SuccessEnvelope<FeedbackAccepted> {
    state
        .feedback
        .record(req.runbook_id, req.outcome, req.timing_ms, req.notes);
    SuccessEnvelope::new(
        FeedbackAccepted { accepted: true },
        ResponseMetadata::default(),
    )
}

#[derive(Debug, Serialize)]
struct HealthReport {
    healthy: bool,
    uptime_secs: u64,
    adapters: std::collections::HashMap<String, runbooks_core::Health>,
}

async fn health(State(state): State<AppState>) -> SuccessEnvelope<HealthReport> {
    let adapters = state.registry.health_check_all().await;
    let healthy = adapters.values().all(|h| h.healthy);
    SuccessEnvelope::new(
        HealthReport {
            healthy,
            uptime_secs: state.started_at.elapsed().as_secs(),
            adapters,
        },
        ResponseMetadata::default(),
    )
}

#[derive(Debug, Serialize)]
struct PerformanceReport {
    uptime_secs: u64,
    feedback: crate::feedback::FeedbackSummary,
}

async fn performance(State(state): State<AppState>) -> SuccessEnvelope<PerformanceReport> {
    SuccessEnvelope::new(
        PerformanceReport {
            uptime_secs: state.started_at.elapsed().as_secs(),
            feedback: state.feedback.summary(),
        },
        ResponseMetadata::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        AppState::new(Arc::new(runbooks_router::AdapterRegistry::new(None)))
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy_with_no_adapters() {
        let app = router(empty_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn runbook_id_without_a_slash_is_a_validation_error() {
        let app = router(empty_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/runbooks/no-slash-here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn decision_tree_with_no_adapters_is_not_found() {
        let app = router(empty_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/decision-tree")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"alert_context":"disk_full"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
