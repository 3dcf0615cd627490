//! Router tests for the scoring service, run against the mock engine.

#[path = "support/app.rs"]
mod app;

use std::time::Duration;

use app::{get_json, post_json, post_raw, send, test_app, test_app_with};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use raf_api::ApiConfig;
use raf_core::EngineError;
use raf_test_utils::fixtures::{small_request, small_request_json};
use raf_test_utils::{fingerprint, MockScoringEngine, ScoringConfig};
use serde_json::{json, Value};

// ============================================================================
// SCORING
// ============================================================================

#[tokio::test]
async fn test_process_data_miss_then_hit() {
    let app = test_app();
    let payload = small_request_json();

    let (status, first) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "success");
    assert_eq!(first["message"], "Data processed successfully");
    assert_eq!(first["cache_status"], "miss");
    assert_eq!(first["count"], 2);
    assert_eq!(first["stale"], false);

    let expected_fp = fingerprint(&small_request()).unwrap().to_hex();
    assert_eq!(first["fingerprint"], expected_fp);

    let (status, second) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cache_status"], "hit");
    assert_eq!(second["results"], first["results"]);
    assert_eq!(second["computed_at"], first["computed_at"]);
    assert_eq!(app.engine.calls(), 1);
}

#[tokio::test]
async fn test_process_data_normalizes_rows() {
    let app = test_app();
    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body["results"].as_array().unwrap();
    assert_eq!(
        rows[0],
        json!({"MemberID": "M001", "PaymentYear": 2024.0, "HccCount": 2.0, "RAF": 0.6})
    );
    assert_eq!(rows[1]["MemberID"], "M002");
    assert_eq!(rows[1]["RAF"], 0.475);
}

#[tokio::test]
async fn test_field_order_does_not_change_cache_key() {
    let app = test_app();
    post_json(&app.router, "/process_data", &small_request_json()).await;

    let reordered = r#"{
        "diagnoses": [
            {"DxCode": "E119", "ThruDOS": "2023-01-05", "FromDOS": "2023-01-05", "MemberID": "M001"},
            {"DxCode": "I5022", "ThruDOS": "2023-01-05", "FromDOS": "2023-01-05", "MemberID": "M001"},
            {"DxCode": "J449", "ThruDOS": "2023-01-05", "FromDOS": "2023-01-05", "MemberID": "M002"}
        ],
        "memberships": [
            {"OREC": "0", "NEMCAID": "N", "LTIMCAID": "N", "Hospice": "N", "RAType": "CN",
             "Gender": "F", "DOB": "1950-03-12", "MemberID": "M001"},
            {"OREC": "0", "NEMCAID": "N", "LTIMCAID": "N", "Hospice": "N", "RAType": "CN",
             "Gender": "F", "DOB": "1950-03-12", "MemberID": "M002"}
        ],
        "payment_year": 2024
    }"#;
    let (status, body) = post_raw(&app.router, "/process_data", reordered).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_status"], "hit");
    assert_eq!(app.engine.calls(), 1);
}

#[tokio::test]
async fn test_different_payment_year_is_a_new_computation() {
    let app = test_app();
    let mut payload = small_request_json();
    post_json(&app.router, "/process_data", &payload).await;

    payload["payment_year"] = json!(2025);
    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_status"], "miss");
    assert_eq!(body["results"][0]["PaymentYear"], 2025.0);
    assert_eq!(app.engine.calls(), 2);
}

#[tokio::test]
async fn test_empty_request_is_scored() {
    let app = test_app();
    let payload = json!({"payment_year": 2024, "memberships": [], "diagnoses": []});
    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["results"], json!([]));
}

// ============================================================================
// INPUT ERRORS
// ============================================================================

fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["code"], code);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_field_rejected() {
    let app = test_app();
    let mut payload = small_request_json();
    payload["memberships"][0]["Extra"] = json!("x");

    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "INVALID_INPUT");
    assert_eq!(app.engine.calls(), 0);
}

#[tokio::test]
async fn test_malformed_date_rejected() {
    let app = test_app();
    let mut payload = small_request_json();
    payload["diagnoses"][0]["FromDOS"] = json!("01/05/2023");

    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "INVALID_INPUT");
}

#[tokio::test]
async fn test_invalid_payment_year_rejected() {
    let app = test_app();
    let mut payload = small_request_json();
    payload["payment_year"] = json!(0);

    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "INVALID_INPUT");
    assert_eq!(body["details"]["field"], "payment_year");
    assert_eq!(body["details"]["value"], 0);
}

#[tokio::test]
async fn test_blank_member_id_reports_location() {
    let app = test_app();
    let mut payload = small_request_json();
    payload["diagnoses"][2]["MemberID"] = json!("  ");

    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["details"],
        json!({"section": "diagnoses", "index": 2, "field": "MemberID"})
    );
}

#[tokio::test]
async fn test_overlong_field_rejected() {
    let app = test_app();
    let mut payload = small_request_json();
    payload["memberships"][1]["Gender"] = json!("FF");

    let (status, body) = post_json(&app.router, "/process_data", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["section"], "memberships");
    assert_eq!(body["details"]["index"], 1);
    assert_eq!(body["details"]["field"], "Gender");
}

#[tokio::test]
async fn test_body_over_limit_rejected() {
    let app = test_app_with(
        MockScoringEngine::new(),
        ScoringConfig::default(),
        ApiConfig {
            max_body_bytes: 256,
            ..Default::default()
        },
    );

    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_error(&body, "PAYLOAD_TOO_LARGE");
}

// ============================================================================
// ENGINE ERRORS
// ============================================================================

#[tokio::test]
async fn test_engine_error_surfaces_as_bad_gateway() {
    let app = test_app();
    app.engine
        .fail_next(EngineError::failed("HCC table missing for payment year"));

    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_error(&body, "COLLABORATOR_ERROR");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("HCC table missing"));
    assert_eq!(app.engine.calls(), 1);

    // Failures are not cached.
    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_status"], "miss");
}

#[tokio::test]
async fn test_unavailable_engine_retried_once() {
    let app = test_app();
    app.engine.fail_next(EngineError::unavailable("connection reset"));

    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_status"], "miss");
    assert_eq!(app.engine.calls(), 2);
}

#[tokio::test]
async fn test_unavailable_engine_surfaces_after_retry() {
    let app = test_app();
    app.engine.fail_next(EngineError::unavailable("connection reset"));
    app.engine.fail_next(EngineError::unavailable("connection refused"));

    let (status, body) = post_json(&app.router, "/process_data", &small_request_json()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_error(&body, "COLLABORATOR_UNAVAILABLE");
    assert_eq!(app.engine.calls(), 2);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_share_one_computation() {
    let app = test_app_with(
        MockScoringEngine::new().with_delay(Duration::from_millis(50)),
        ScoringConfig::default(),
        ApiConfig::default(),
    );
    let payload = small_request_json();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let router = app.router.clone();
            let payload = payload.clone();
            tokio::spawn(async move { post_json(&router, "/process_data", &payload).await })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        statuses.push(body["cache_status"].as_str().unwrap().to_string());
    }

    assert_eq!(app.engine.calls(), 1);
    assert_eq!(statuses.iter().filter(|s| *s == "miss").count(), 1);
    assert_eq!(statuses.iter().filter(|s| *s == "hit").count(), 5);
}

// ============================================================================
// AUXILIARY ROUTES
// ============================================================================

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let app = test_app();
    post_json(&app.router, "/process_data", &small_request_json()).await;
    post_json(&app.router, "/process_data", &small_request_json()).await;

    let (status, stats) = get_json(&app.router, "/api/v1/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["capacity"], 128);
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["engine_calls"], 1);
    assert_eq!(stats["ttl_seconds"], 3600);
    assert_eq!(stats["hit_rate"], 0.5);
    assert_eq!(app.executor.stats().unwrap().entries, 1);
}

#[tokio::test]
async fn test_home_page() {
    let app = test_app();
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("RAF Calculator API"));
    assert!(html.contains("POST /process_data"));
}

#[tokio::test]
async fn test_health_routes() {
    let app = test_app();
    let request = Request::builder()
        .uri("/health/ping")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(&app.router, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    app.engine.set_unhealthy(true);
    let (status, body) = get_json(&app.router, "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["details"]["engine"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_scoring_metrics() {
    let app = test_app();
    post_json(&app.router, "/process_data", &small_request_json()).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("raf_cache_lookups_total"));
    assert!(text.contains("raf_http_requests_total"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/does/not/exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[cfg(feature = "openapi")]
#[tokio::test]
async fn test_openapi_document_served() {
    let app = test_app();
    let (status, doc) = get_json(&app.router, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/process_data"].is_object());
}
