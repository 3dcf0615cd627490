//! Prometheus Metrics Definitions
//!
//! Defines the service metrics with their labels and exposes a /metrics
//! endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Scoring engine latency buckets (seconds). Staging large requests and
/// running the procedure routinely takes seconds to minutes.
const ENGINE_LATENCY_BUCKETS: &[f64] = &[
    0.010, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<RafMetrics>> = Lazy::new(RafMetrics::new);

/// Container for all service metrics.
#[derive(Clone)]
pub struct RafMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Scoring cache lookups - labels: status (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Ready results currently cached
    pub cache_ready_entries: IntGauge,

    /// Scoring engine calls - labels: engine, outcome (success/unavailable/failed)
    pub engine_calls_total: CounterVec,

    /// Scoring engine call duration - labels: engine
    pub engine_call_duration_seconds: HistogramVec,

    /// Result values passed through without normalization
    pub normalization_anomalies_total: IntCounter,
}

impl RafMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "raf_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "raf_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "raf_cache_lookups_total",
                "Scoring cache lookups by status",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            cache_ready_entries: register_int_gauge!(
                "raf_cache_ready_entries",
                "Scoring results currently cached"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_ready_entries: {}", e)))?,

            engine_calls_total: register_counter_vec!(
                "raf_engine_calls_total",
                "Scoring engine calls by outcome",
                &["engine", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register engine_calls_total: {}", e)))?,

            engine_call_duration_seconds: register_histogram_vec!(
                "raf_engine_call_duration_seconds",
                "Scoring engine call duration in seconds",
                &["engine"],
                ENGINE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register engine_call_duration_seconds: {}", e)))?,

            normalization_anomalies_total: register_int_counter!(
                "raf_normalization_anomalies_total",
                "Result values passed through without normalization"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register normalization_anomalies_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a cache lookup outcome.
    pub fn record_cache_lookup(&self, status: &str) {
        self.cache_lookups_total.with_label_values(&[status]).inc();
    }

    pub fn set_ready_entries(&self, entries: usize) {
        self.cache_ready_entries.set(entries as i64);
    }

    /// Record one scoring engine call.
    pub fn record_engine_call(&self, engine: &str, outcome: &str, duration_secs: f64) {
        self.engine_calls_total
            .with_label_values(&[engine, outcome])
            .inc();
        self.engine_call_duration_seconds
            .with_label_values(&[engine])
            .observe(duration_secs);
    }

    pub fn record_anomalies(&self, count: usize) {
        self.normalization_anomalies_total.inc_by(count as u64);
    }
}

/// Run `f` against the global metrics when registration succeeded.
pub fn with_metrics(f: impl FnOnce(&RafMetrics)) {
    match METRICS.as_ref() {
        Ok(metrics) => f(metrics),
        Err(e) => tracing::debug!(error = %e, "Metrics unavailable"),
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure service metrics exist even before the first request.
    Lazy::force(&METRICS);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
