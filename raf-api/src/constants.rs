//! Constants for the RAF API
//!
//! Defaults for every environment-driven setting live here so they can be
//! found and tested in one place.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Default request body limit (64 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// DATABASE
// ============================================================================

/// Default pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default pool wait timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

/// Scoring procedure called when none is configured
pub const DEFAULT_SCORING_PROCEDURE: &str = "rs_medicare_partc_outer";

// ============================================================================
// SERVICE
// ============================================================================

/// Default service name reported in logs
pub const DEFAULT_SERVICE_NAME: &str = "raf-api";

/// Message returned with every successful scoring response
pub const SUCCESS_MESSAGE: &str = "Data processed successfully";
