//! End-to-end check of the axum mirror against a real filesystem adapter,
//! the spec §8 scenario-1 shape ("filesystem hit").

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use runbooks_adapters::config::FsAdapterConfig;
use runbooks_router::{AdapterKind, AdapterRegistry, SourceRegistration};
use runbooks_server::{http, AppState};

fn fs_config(name: &str, root: &str) -> FsAdapterConfig {
    FsAdapterConfig {
        name: name.to_string(),
        roots: vec![root.to_string()],
        categories: vec![],
        recursive: true,
        max_depth: 5,
        extensions: vec!["md".to_string()],
        exclude: vec![],
        size_cap_bytes: 1024 * 1024,
        watch: false,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn searching_runbooks_surfaces_a_filesystem_match() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("runbooks")).unwrap();
    std::fs::write(
        dir.path().join("runbooks/memory-leak.md"),
        "# Memory Leak Recovery\n\n1. Identify\n2. Capture heap\n3. Restart service\n",
    )
    .unwrap();

    let registry = AdapterRegistry::new(None);
    let registered = registry
        .create_adapter(SourceRegistration {
            enabled: true,
            priority: 0,
            timeout_ms: 5_000,
            kind: AdapterKind::Filesystem(fs_config("local-docs", dir.path().to_str().unwrap())),
        })
        .await;
    assert!(registered);

    let state = AppState::new(Arc::new(registry));
    let app = http::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/runbooks/search")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"alert_type":"memory_leak","severity":"high","affected_systems":["api-01"]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["success"].as_bool().unwrap());
    let runbooks = body["data"].as_array().unwrap();
    assert_eq!(runbooks.len(), 1);
    assert_eq!(runbooks[0]["procedures"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn feedback_round_trips_through_performance() {
    let state = AppState::new(Arc::new(AdapterRegistry::new(None)));
    let app = http::router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/feedback")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"runbook_id":"local-docs/memory-leak","outcome":"resolved","timing_ms":4200}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/performance").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["feedback"]["total"], 1);
    assert_eq!(body["data"]["feedback"]["resolved"], 1);
}
