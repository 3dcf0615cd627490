//! Scoring pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::{validate_batch_size, StagingTable, DEFAULT_BATCH_SIZE};
use crate::error::ConfigError;

/// Ready entries kept before the least recently used one is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Age after which a cached result is reported as stale.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(3600);

/// Extra attempts after the engine reports itself unavailable.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;

/// Memoization and staging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub cache_capacity: usize,
    /// Advisory only; entries are never expired by age.
    #[serde(with = "duration_secs")]
    pub entry_ttl: Duration,
    pub batch_size: usize,
    pub retry_attempts: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            entry_ttl: DEFAULT_ENTRY_TTL,
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Reject settings the executor or the staging encoder cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_capacity".to_string(),
                value: "0".to_string(),
                reason: "must hold at least one entry".to_string(),
            });
        }
        for table in StagingTable::ALL {
            validate_batch_size(table, self.batch_size)?;
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.entry_ttl, Duration::from_secs(3600));
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.retry_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ScoringConfig::new().with_capacity(0).validate().is_err());
        assert!(ScoringConfig::new().with_batch_size(0).validate().is_err());
        // membership rows bind eight parameters each
        assert!(ScoringConfig::new().with_batch_size(10_000).validate().is_err());
        assert!(ScoringConfig::new().with_batch_size(8191).validate().is_ok());
    }

    #[test]
    fn test_serde_uses_seconds() {
        let config = ScoringConfig::new().with_ttl(Duration::from_secs(90));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["entry_ttl"], 90);
        let back: ScoringConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
