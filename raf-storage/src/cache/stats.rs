//! Executor statistics.

use serde::{Deserialize, Serialize};

/// Snapshot of memoization counters since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Maximum number of ready results.
    pub capacity: usize,
    /// Ready results currently held.
    pub entries: usize,
    /// Computations in flight.
    pub pending: usize,
    /// Requests served from a ready result.
    pub hits: u64,
    /// Requests that started a computation.
    pub misses: u64,
    /// Requests that waited on another request's computation.
    pub coalesced: u64,
    /// Ready results dropped for capacity.
    pub evictions: u64,
    /// Calls made to the scoring engine, retries included.
    pub engine_calls: u64,
    /// Engine calls repeated after an unavailable error.
    pub retries: u64,
    /// Computations that ended in an error.
    pub failures: u64,
}

impl CacheStats {
    /// Share of requests that did not start a computation (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
