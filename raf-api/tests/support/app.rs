use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use raf_api::{create_api_router, ApiConfig, AppState};
use raf_storage::MemoizingExecutor;
use raf_test_utils::{MockScoringEngine, ScoringConfig};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<MockScoringEngine>,
    pub executor: Arc<MemoizingExecutor>,
}

pub fn test_app_with(
    engine: MockScoringEngine,
    scoring: ScoringConfig,
    api: ApiConfig,
) -> TestApp {
    let engine = Arc::new(engine);
    let executor = Arc::new(
        MemoizingExecutor::new(engine.clone(), scoring).expect("Failed to build executor"),
    );
    let router = create_api_router(AppState::new(executor.clone(), api));
    TestApp {
        router,
        engine,
        executor,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(
        MockScoringEngine::new(),
        ScoringConfig::default(),
        ApiConfig::default(),
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router call failed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, body.to_vec())
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).expect("Body is not JSON"))
}

pub async fn post_raw(router: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("Failed to build request");
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).expect("Body is not JSON"))
}

pub async fn post_json(router: &Router, uri: &str, payload: &Value) -> (StatusCode, Value) {
    post_raw(router, uri, payload.to_string()).await
}
