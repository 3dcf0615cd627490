//! OpenAPI Specification for the RAF API
//!
//! Generated with utoipa from the route annotations and response types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, scoring};
use crate::telemetry::metrics;
use crate::types::{CacheStatsResponse, ProcessDataResponse};

use raf_core::{DiagnosisRecord, Flag, MembershipRecord, ScoringRequest};

/// OpenAPI document for the RAF API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RAF Calculator API",
        description = "Medicare Part C risk adjustment factor scoring with request-level memoization",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Scoring", description = "Risk score calculation and result cache"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        scoring::home,
        scoring::process_data,
        scoring::cache_stats,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            ScoringRequest, MembershipRecord, DiagnosisRecord, Flag,
            ProcessDataResponse, CacheStatsResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
