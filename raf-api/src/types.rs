//! API Request and Response Types
//!
//! The request body is [`raf_core::ScoringRequest`] itself; this module
//! holds the response envelopes.

use raf_core::{ScoringResultRow, Timestamp};
use raf_storage::{CacheEntry, CacheRead, CacheStats, CacheStatus};
use serde::Serialize;
use std::sync::Arc;

use crate::constants::SUCCESS_MESSAGE;

// ============================================================================
// SCORING TYPES
// ============================================================================

/// Successful response of `POST /process_data`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProcessDataResponse {
    /// Always "success"
    pub status: String,
    pub message: String,
    /// "hit" when the rows came from a stored or in-flight computation
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "miss"))]
    pub cache_status: CacheStatus,
    /// Hex SHA-256 fingerprint of the canonical request
    pub fingerprint: String,
    /// Number of result rows
    pub count: usize,
    /// Result rows with the engine's column names
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub results: Vec<ScoringResultRow>,
    /// When the rows were computed
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub computed_at: Timestamp,
    /// The rows are older than the advisory cache TTL
    pub stale: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub timestamp: Timestamp,
}

impl ProcessDataResponse {
    pub fn from_read(read: &CacheRead<Arc<CacheEntry>>) -> Self {
        let entry = read.value();
        Self {
            status: "success".to_string(),
            message: SUCCESS_MESSAGE.to_string(),
            cache_status: read.status(),
            fingerprint: entry.fingerprint.to_hex(),
            count: entry.rows.len(),
            results: entry.rows.clone(),
            computed_at: read.computed_at(),
            stale: read.is_stale(),
            timestamp: chrono::Utc::now(),
        }
    }
}

// ============================================================================
// CACHE TYPES
// ============================================================================

/// Response of `GET /api/v1/cache/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheStatsResponse {
    pub capacity: usize,
    pub entries: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub engine_calls: u64,
    pub retries: u64,
    pub failures: u64,
    /// Share of requests that did not start a computation
    pub hit_rate: f64,
    /// Advisory freshness window in seconds
    pub ttl_seconds: u64,
}

impl CacheStatsResponse {
    pub fn new(stats: CacheStats, ttl_seconds: u64) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            capacity: stats.capacity,
            entries: stats.entries,
            pending: stats.pending,
            hits: stats.hits,
            misses: stats.misses,
            coalesced: stats.coalesced,
            evictions: stats.evictions,
            engine_calls: stats.engine_calls,
            retries: stats.retries,
            failures: stats.failures,
            ttl_seconds,
        }
    }
}
