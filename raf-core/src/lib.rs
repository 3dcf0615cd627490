//! RAF Core - Scoring Request Types
//!
//! Records, request fingerprinting, staging batch encoding and result
//! normalization. Everything here is synchronous and I/O free; the cache
//! and the engine adapters live in `raf-storage` and `raf-api`.

pub mod batch;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod records;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use batch::{
    encode, insert_statement, validate_batch_size, Batches, EncodedBatch, StagingColumn,
    StagingPlan, StagingRecord, StagingTable, StagingValue, DEFAULT_BATCH_SIZE,
    MAX_BIND_PARAMETERS,
};
pub use config::{ScoringConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_ENTRY_TTL, DEFAULT_RETRY_ATTEMPTS};
pub use error::{
    ConfigError, EngineError, NormalizationAnomaly, RecordSection, ScoringError, ScoringResult,
    ValidationError,
};
pub use fingerprint::{fingerprint, CanonicalFields, RequestFingerprint};
pub use normalize::{
    normalize, normalize_result_set, NormalizedResult, RawResultSet, RawValue, ScoreValue,
    ScoringResultRow,
};
pub use records::{DiagnosisRecord, Flag, MembershipRecord, ScoringRequest};
