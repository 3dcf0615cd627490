//! API Configuration Module
//!
//! Server, CORS and scoring settings. Configuration is loaded once at
//! startup from environment variables with defaults suitable for
//! development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use raf_core::{ConfigError, ScoringConfig};

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT,
};

/// Parse `key` from `lookup`, falling back to `default` when unset.
///
/// A value that is set but unparsable is an error rather than a silent default.
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `RAF_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT`, then `RAF_API_PORT`: Port (default: 8000)
    /// - `RAF_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `RAF_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `RAF_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `RAF_MAX_BODY_BYTES`: Request body limit (default: 64 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_host = lookup("RAF_API_BIND").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let port = match lookup("PORT") {
            Some(_) => parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            None => parse_var(&lookup, "RAF_API_PORT", DEFAULT_PORT)?,
        };

        let cors_origins = lookup("RAF_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = lookup("RAF_CORS_ALLOW_CREDENTIALS")
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs: parse_var(
                &lookup,
                "RAF_CORS_MAX_AGE_SECS",
                DEFAULT_CORS_MAX_AGE_SECS,
            )?,
            max_body_bytes: parse_var(&lookup, "RAF_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    /// Socket address built from host and port.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "RAF_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

// ============================================================================
// SCORING CONFIGURATION
// ============================================================================

/// Load executor settings.
///
/// Environment variables:
/// - `RAF_CACHE_CAPACITY`: Ready results kept (default: 128)
/// - `RAF_CACHE_TTL_SECS`: Advisory freshness window (default: 3600)
/// - `RAF_BATCH_SIZE`: Records per staging insert (default: 1000)
/// - `RAF_RETRY_ATTEMPTS`: Retries after an unavailable engine (default: 1)
pub fn scoring_config_from_env() -> Result<ScoringConfig, ConfigError> {
    scoring_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn scoring_config_from_lookup<F>(lookup: F) -> Result<ScoringConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ScoringConfig::default();
    let ttl_secs = parse_var(&lookup, "RAF_CACHE_TTL_SECS", defaults.entry_ttl.as_secs())?;

    let config = ScoringConfig::new()
        .with_capacity(parse_var(&lookup, "RAF_CACHE_CAPACITY", defaults.cache_capacity)?)
        .with_ttl(Duration::from_secs(ttl_secs))
        .with_batch_size(parse_var(&lookup, "RAF_BATCH_SIZE", defaults.batch_size)?)
        .with_retry_attempts(parse_var(
            &lookup,
            "RAF_RETRY_ATTEMPTS",
            defaults.retry_attempts,
        )?);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.max_body_bytes, 64 * 1024 * 1024);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn test_port_precedence() {
        let config =
            ApiConfig::from_lookup(lookup(&[("PORT", "9100"), ("RAF_API_PORT", "9200")])).unwrap();
        assert_eq!(config.port, 9100);

        let config = ApiConfig::from_lookup(lookup(&[("RAF_API_PORT", "9200")])).unwrap();
        assert_eq!(config.port, 9200);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_invalid_bind_host() {
        let config = ApiConfig::from_lookup(lookup(&[("RAF_API_BIND", "not a host")])).unwrap();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_cors_origins_parsing() {
        let config = ApiConfig::from_lookup(lookup(&[(
            "RAF_CORS_ORIGINS",
            "https://raf.example.com, ,https://app.example.com",
        )]))
        .unwrap();
        assert_eq!(config.cors_origins.len(), 2);
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://app.example.com"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let config = ApiConfig {
            cors_origins: vec!["*.example.com".to_string()],
            ..Default::default()
        };
        assert!(config.is_origin_allowed("https://app.example.com"));
        assert!(!config.is_origin_allowed("https://notexample.com"));
    }

    #[test]
    fn test_scoring_config_defaults() {
        let config = scoring_config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ScoringConfig::default());
    }

    #[test]
    fn test_scoring_config_overrides() {
        let config = scoring_config_from_lookup(lookup(&[
            ("RAF_CACHE_CAPACITY", "16"),
            ("RAF_CACHE_TTL_SECS", "60"),
            ("RAF_BATCH_SIZE", "250"),
            ("RAF_RETRY_ATTEMPTS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.entry_ttl, Duration::from_secs(60));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.retry_attempts, 0);
    }

    #[test]
    fn test_scoring_config_rejects_invalid_values() {
        assert!(scoring_config_from_lookup(lookup(&[("RAF_CACHE_CAPACITY", "0")])).is_err());
        assert!(scoring_config_from_lookup(lookup(&[("RAF_BATCH_SIZE", "9000")])).is_err());
        assert!(scoring_config_from_lookup(lookup(&[("RAF_CACHE_TTL_SECS", "-1")])).is_err());
    }
}
