//! RAF API - HTTP Scoring Service
//!
//! Exposes the memoizing scoring executor over REST (Axum) and provides the
//! Postgres scoring engine that stages records into temporary tables and
//! runs the scoring procedure.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{scoring_config_from_env, scoring_config_from_lookup, ApiConfig};
pub use db::{DbConfig, PgScoringEngine};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use telemetry::InstrumentedEngine;
pub use types::{CacheStatsResponse, ProcessDataResponse};
