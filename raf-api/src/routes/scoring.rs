//! Scoring routes.
//!
//! `POST /process_data` validates and fingerprints the request, then hands
//! it to the memoizing executor. Identical requests, concurrent or not, share
//! one engine computation while the result stays cached.
//!
//! # Example
//!
//! ```ignore
//! POST /process_data
//! {
//!   "payment_year": 2024,
//!   "memberships": [{"MemberID": "M001", "DOB": "1950-03-12", "Gender": "F",
//!                    "RAType": "CN", "Hospice": "N", "LTIMCAID": "N",
//!                    "NEMCAID": "N", "OREC": "0"}],
//!   "diagnoses": [{"MemberID": "M001", "FromDOS": "2023-01-05",
//!                  "ThruDOS": "2023-01-05", "DxCode": "E119"}]
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    Json,
};
use raf_core::{fingerprint, ScoringRequest};
use raf_storage::MemoizingExecutor;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::with_metrics;
use crate::types::{CacheStatsResponse, ProcessDataResponse};

const USAGE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>RAF Calculator API</title></head>
<body>
<h1>RAF Calculator API</h1>
<p>POST /process_data with JSON payload:</p>
<pre>
{
    "payment_year": 2024,
    "memberships": [...],
    "diagnoses": [...]
}
</pre>
<p>Cache statistics: GET /api/v1/cache/stats</p>
</body>
</html>
"#;

/// GET / - Usage page
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/",
    tag = "Scoring",
    responses(
        (status = 200, description = "HTML usage page", content_type = "text/html", body = String),
    ),
))]
pub async fn home() -> Html<&'static str> {
    Html(USAGE_PAGE)
}

/// POST /process_data - Score a batch of members
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/process_data",
    tag = "Scoring",
    request_body = ScoringRequest,
    responses(
        (status = 200, description = "Scores computed or served from cache", body = ProcessDataResponse),
        (status = 400, description = "Malformed or invalid request", body = ApiError),
        (status = 413, description = "Request body too large", body = ApiError),
        (status = 502, description = "Scoring engine reported an error", body = ApiError),
        (status = 503, description = "Scoring engine unavailable", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
))]
pub async fn process_data(
    State(executor): State<Arc<MemoizingExecutor>>,
    payload: Result<Json<ScoringRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessDataResponse>> {
    let Json(request) = payload?;
    let fp = fingerprint(&request)?;

    tracing::info!(
        members = request.memberships.len(),
        diagnoses = request.diagnoses.len(),
        payment_year = request.payment_year,
        fingerprint = %fp.short(),
        "Processing scoring request"
    );

    let read = executor.execute(Arc::new(request), fp).await?;
    let entries = executor.stats().map(|stats| stats.entries).ok();

    with_metrics(|metrics| {
        metrics.record_cache_lookup(read.status().as_str());
        if let Some(entries) = entries {
            metrics.set_ready_entries(entries);
        }
        if read.was_cache_miss() && read.value().anomalies > 0 {
            metrics.record_anomalies(read.value().anomalies);
        }
    });

    let response = ProcessDataResponse::from_read(&read);
    tracing::info!(
        count = response.count,
        cache_status = %response.cache_status,
        stale = response.stale,
        "Successfully processed scoring request"
    );
    Ok(Json(response))
}

/// GET /api/v1/cache/stats - Executor cache statistics
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/cache/stats",
    tag = "Scoring",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
))]
pub async fn cache_stats(
    State(executor): State<Arc<MemoizingExecutor>>,
) -> ApiResult<Json<CacheStatsResponse>> {
    let stats = executor.stats()?;
    let ttl = executor.config().entry_ttl.as_secs();
    Ok(Json(CacheStatsResponse::new(stats, ttl)))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
