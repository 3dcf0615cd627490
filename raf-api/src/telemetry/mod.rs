//! RAF Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the HTTP
//! layer and the scoring engine.

pub mod engine;
pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use engine::InstrumentedEngine;
pub use metrics::{metrics_handler, with_metrics, RafMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
