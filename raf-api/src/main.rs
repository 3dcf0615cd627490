//! RAF API Server Entry Point
//!
//! Bootstraps configuration, builds the Postgres scoring engine and the
//! memoizing executor, and starts the Axum HTTP server.

use std::sync::Arc;

use raf_api::telemetry::{init_tracer, TelemetryConfig};
use raf_api::{
    create_api_router, scoring_config_from_env, ApiConfig, ApiError, ApiResult, AppState,
    DbConfig, InstrumentedEngine, PgScoringEngine,
};
use raf_storage::{MemoizingExecutor, ScoringEngine};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let db_config = DbConfig::from_env();
    let pg = PgScoringEngine::from_config(&db_config)?;
    tracing::info!(
        host = %db_config.host,
        dbname = %db_config.dbname,
        procedure = pg.procedure(),
        pool_size = pg.pool_size(),
        "Scoring engine configured"
    );
    let engine: Arc<dyn ScoringEngine> = Arc::new(InstrumentedEngine::new(Arc::new(pg)));

    let scoring_config = scoring_config_from_env()?;
    tracing::info!(
        cache_capacity = scoring_config.cache_capacity,
        ttl_secs = scoring_config.entry_ttl.as_secs(),
        batch_size = scoring_config.batch_size,
        retry_attempts = scoring_config.retry_attempts,
        "Scoring executor configured"
    );
    let executor = Arc::new(MemoizingExecutor::new(engine, scoring_config)?);

    let api_config = ApiConfig::from_env()?;
    let addr = api_config.bind_addr()?;
    let app = create_api_router(AppState::new(executor, api_config));

    tracing::info!(%addr, "Starting RAF API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
