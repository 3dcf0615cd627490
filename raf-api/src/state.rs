//! Shared application state for Axum routers.

use std::sync::Arc;

use raf_storage::MemoizingExecutor;

use crate::config::ApiConfig;

/// Application-wide state shared across all routes.
///
/// The executor, and with it the result cache, belongs to this service
/// instance. Two states built from separate executors share nothing.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<MemoizingExecutor>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(executor: Arc<MemoizingExecutor>, config: ApiConfig) -> Self {
        Self {
            executor,
            config: Arc::new(config),
        }
    }
}

crate::impl_from_ref!(Arc<MemoizingExecutor>, executor);
crate::impl_from_ref!(Arc<ApiConfig>, config);
