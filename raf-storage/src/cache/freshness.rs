//! Freshness metadata for scoring reads.
//!
//! Cached results never expire on their own. Instead every read carries the
//! time the result was computed and whether it has outlived the advisory
//! TTL, so callers can surface staleness without the cache acting on it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a read was served from a stored result or computed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an executor read, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the underlying result was computed.
    computed_at: DateTime<Utc>,
    status: CacheStatus,
    /// Older than the advisory TTL at the time of the read.
    stale: bool,
}

impl<T> CacheRead<T> {
    /// A read served from a result computed earlier.
    pub fn from_cache(value: T, computed_at: DateTime<Utc>, ttl: Duration) -> Self {
        let mut read = Self {
            value,
            computed_at,
            status: CacheStatus::Hit,
            stale: false,
        };
        read.stale = read.staleness() > ttl;
        read
    }

    /// A read whose result was computed for this caller.
    pub fn computed(value: T, computed_at: DateTime<Utc>) -> Self {
        Self {
            value,
            computed_at,
            status: CacheStatus::Miss,
            stale: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// How long ago the result was computed.
    pub fn staleness(&self) -> Duration {
        let now = Utc::now();
        if now > self.computed_at {
            (now - self.computed_at).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn status(&self) -> CacheStatus {
        self.status
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn was_cache_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }

    pub fn was_cache_miss(&self) -> bool {
        self.status == CacheStatus::Miss
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            computed_at: self.computed_at,
            status: self.status,
            stale: self.stale,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
