//! Postgres Scoring Engine
//!
//! This module provides PostgreSQL connection pooling using deadpool-postgres
//! and the [`ScoringEngine`] implementation that stages a request into
//! temporary tables and calls the scoring procedure.
//!
//! Every computation runs inside one transaction on one pooled connection:
//! the temp tables are created `ON COMMIT DROP`, so nothing staged for one
//! request can be seen by another, and a failure anywhere rolls the whole
//! computation back.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use once_cell::sync::Lazy;
use postgres_types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use raf_core::{
    ConfigError, EncodedBatch, EngineError, RawResultSet, RawValue, StagingPlan, StagingRecord,
    StagingTable, StagingValue,
};
use raf_storage::ScoringEngine;
use regex::Regex;
use rust_decimal::Decimal;
use tokio_postgres::{NoTls, Row, Transaction};
use tracing::{debug, info};

use crate::constants::{DEFAULT_DB_POOL_SIZE, DEFAULT_DB_TIMEOUT_SECS, DEFAULT_SCORING_PROCEDURE};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a pooled connection
    pub timeout: Duration,
    /// Per-computation statement timeout, unset for none
    pub statement_timeout: Option<Duration>,
    /// Set-returning function that computes the scores
    pub procedure: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "ramodule".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            statement_timeout: None,
            procedure: DEFAULT_SCORING_PROCEDURE.to_string(),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("RAF_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("RAF_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("RAF_DB_NAME").unwrap_or_else(|_| "ramodule".to_string()),
            user: std::env::var("RAF_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("RAF_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("RAF_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_POOL_SIZE),
            timeout: Duration::from_secs(
                std::env::var("RAF_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
            ),
            statement_timeout: std::env::var("RAF_DB_STATEMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            procedure: std::env::var("RAF_SCORING_PROCEDURE")
                .unwrap_or_else(|_| DEFAULT_SCORING_PROCEDURE.to_string()),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// PROCEDURE NAME VALIDATION
// ============================================================================

static PROCEDURE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").ok());

/// Accept `name` or `schema.name`; the procedure is spliced into SQL text.
pub fn validate_procedure_name(name: &str) -> Result<(), ConfigError> {
    let valid = PROCEDURE_NAME
        .as_ref()
        .map(|re| re.is_match(name))
        .unwrap_or(false);
    if valid && name.len() <= 127 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "RAF_SCORING_PROCEDURE".to_string(),
            value: name.to_string(),
            reason: "must be an unquoted identifier, optionally schema-qualified".to_string(),
        })
    }
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

/// SQLSTATEs worth another attempt: connection exceptions (08),
/// insufficient resources (53), operator intervention (57P),
/// serialization failure and deadlock.
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || code.starts_with("57P")
        || code == "40001"
        || code == "40P01"
}

fn classify_db_error(err: tokio_postgres::Error) -> EngineError {
    if let Some(db) = err.as_db_error() {
        let code = db.code().code();
        return if is_transient_sqlstate(code) {
            EngineError::unavailable(format!("{} (SQLSTATE {})", db.message(), code))
        } else {
            EngineError::failed(db.message())
        };
    }
    let io = err
        .source()
        .map(|source| source.is::<std::io::Error>())
        .unwrap_or(false);
    if err.is_closed() || io {
        EngineError::unavailable(err.to_string())
    } else {
        EngineError::failed(err.to_string())
    }
}

fn classify_pool_error(err: deadpool_postgres::PoolError) -> EngineError {
    match err {
        deadpool_postgres::PoolError::Backend(e) => classify_db_error(e),
        other => EngineError::unavailable(format!("connection pool: {}", other)),
    }
}

// ============================================================================
// PARAMETER AND VALUE CODECS
// ============================================================================

/// Binds a [`StagingValue`] as a query parameter.
#[derive(Debug)]
struct StagingParam<'a>(&'a StagingValue);

impl ToSql for StagingParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self.0 {
            StagingValue::Text(s) => s.as_str().to_sql(ty, out),
            StagingValue::Date(d) => d.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <&str as ToSql>::accepts(ty) || <NaiveDate as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

/// NUMERIC column value.
///
/// Values [`Decimal`] cannot hold (NaN, infinities, more than 28 significant
/// digits) keep their wire bytes and surface as a normalization anomaly.
#[derive(Debug, Clone, PartialEq)]
pub struct PgNumeric(pub RawValue);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(PgNumeric(match Decimal::from_sql(ty, raw) {
            Ok(value) => RawValue::Decimal(value.to_string()),
            Err(e) => {
                debug!(error = %e, "NUMERIC outside decimal range, passing raw bytes");
                RawValue::Bytes(raw.to_vec())
            }
        }))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Column payload for types with no dedicated mapping.
struct Opaque(Vec<u8>);

impl<'a> FromSql<'a> for Opaque {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(Opaque(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_value(row: &Row, idx: usize) -> Result<RawValue, tokio_postgres::Error> {
    fn get<'a, T: FromSql<'a>>(
        row: &'a Row,
        idx: usize,
        wrap: impl FnOnce(T) -> RawValue,
    ) -> Result<RawValue, tokio_postgres::Error> {
        Ok(row
            .try_get::<_, Option<T>>(idx)?
            .map(wrap)
            .unwrap_or(RawValue::Null))
    }

    let ty = row.columns()[idx].type_().clone();
    match ty {
        Type::BOOL => get(row, idx, RawValue::Bool),
        Type::INT2 => get(row, idx, |v: i16| RawValue::Integer(i64::from(v))),
        Type::INT4 => get(row, idx, |v: i32| RawValue::Integer(i64::from(v))),
        Type::INT8 => get(row, idx, RawValue::Integer),
        Type::FLOAT4 => get(row, idx, |v: f32| RawValue::Float(f64::from(v))),
        Type::FLOAT8 => get(row, idx, RawValue::Float),
        Type::NUMERIC => get(row, idx, |v: PgNumeric| v.0),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get(row, idx, RawValue::Text),
        Type::DATE => get::<NaiveDate>(row, idx, RawValue::Date),
        Type::TIME => get::<NaiveTime>(row, idx, RawValue::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, RawValue::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx, RawValue::TimestampTz),
        Type::JSON | Type::JSONB => get(row, idx, RawValue::Json),
        Type::BYTEA => get(row, idx, RawValue::Bytes),
        _ => get(row, idx, |v: Opaque| RawValue::Bytes(v.0)),
    }
}

// ============================================================================
// POSTGRES SCORING ENGINE
// ============================================================================

/// [`ScoringEngine`] backed by a Postgres scoring procedure.
#[derive(Clone)]
pub struct PgScoringEngine {
    pool: Pool,
    procedure: String,
    statement_timeout: Option<Duration>,
}

impl PgScoringEngine {
    pub fn new(pool: Pool, config: &DbConfig) -> Result<Self, ConfigError> {
        validate_procedure_name(&config.procedure)?;
        Ok(Self {
            pool,
            procedure: config.procedure.clone(),
            statement_timeout: config.statement_timeout,
        })
    }

    /// Create the pool and the engine from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool, config)?)
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn stage<'p, R: StagingRecord + Sync + 'p>(
        tx: &Transaction<'_>,
        batches: impl Iterator<Item = EncodedBatch<'p, R>>,
    ) -> Result<usize, EngineError> {
        let mut staged = 0;
        for batch in batches {
            let params: Vec<StagingParam<'_>> = batch.params.iter().map(StagingParam).collect();
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
            tx.execute(batch.statement.as_str(), &refs)
                .await
                .map_err(classify_db_error)?;
            debug!(
                table = batch.table.name(),
                batch = batch.index,
                rows = batch.len(),
                "Staged batch"
            );
            staged += batch.len();
        }
        Ok(staged)
    }
}

#[async_trait]
impl ScoringEngine for PgScoringEngine {
    async fn score(&self, plan: &StagingPlan) -> Result<RawResultSet, EngineError> {
        let started = Instant::now();
        let mut conn = self.pool.get().await.map_err(classify_pool_error)?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await.map_err(classify_db_error)?;

        if let Some(timeout) = self.statement_timeout {
            tx.batch_execute(&format!(
                "SET LOCAL statement_timeout = {}",
                timeout.as_millis()
            ))
            .await
            .map_err(classify_db_error)?;
        }

        for table in StagingTable::ALL {
            tx.batch_execute(&table.create_statement())
                .await
                .map_err(classify_db_error)?;
        }

        let members = Self::stage(&tx, plan.membership_batches()).await?;
        let diagnoses = Self::stage(&tx, plan.diagnosis_batches()).await?;

        let query = format!("SELECT * FROM {}($1)", self.procedure);
        let statement = tx.prepare(&query).await.map_err(classify_db_error)?;
        let rows = tx
            .query(&statement, &[&plan.payment_year()])
            .await
            .map_err(classify_db_error)?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let mut result = RawResultSet::new(columns);
        for row in &rows {
            let values = (0..row.len())
                .map(|idx| decode_value(row, idx))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| EngineError::failed(format!("Failed to decode result row: {}", e)))?;
            result.rows.push(values);
        }

        tx.commit().await.map_err(classify_db_error)?;

        info!(
            procedure = %self.procedure,
            members,
            diagnoses,
            rows = result.rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scoring procedure completed"
        );
        Ok(result)
    }

    async fn health_check(&self) -> Result<Duration, EngineError> {
        let start = Instant::now();
        let conn = self.pool.get().await.map_err(classify_pool_error)?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(classify_db_error)?;
        Ok(start.elapsed())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ndigits.to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn decode(raw: &[u8]) -> RawValue {
        PgNumeric::from_sql(&Type::NUMERIC, raw).unwrap().0
    }

    fn decimal(raw: &[u8]) -> Decimal {
        match decode(raw) {
            RawValue::Decimal(text) => text.parse().unwrap(),
            other => panic!("expected decimal, got {:?}", other),
        }
    }

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_numeric_decoding() {
        assert_eq!(decimal(&numeric(2, 0, 0, 2, &[123, 4500])), dec("123.45"));
        assert_eq!(decimal(&numeric(0, 0, 0, 0, &[])), Decimal::ZERO);
        assert_eq!(decimal(&numeric(2, 1, 0, 0, &[1, 2])), dec("10002"));
        assert_eq!(decimal(&numeric(1, 1, 0, 0, &[12])), dec("120000"));
        assert_eq!(decimal(&numeric(1, -1, 0x4000, 4, &[3500])), dec("-0.35"));
        assert_eq!(decimal(&numeric(2, 0, 0, 3, &[1, 2340])), dec("1.234"));
    }

    #[test]
    fn test_numeric_small_fractions() {
        // 0.000012 is sent as weight -2 with the single digit group 1200.
        assert_eq!(decimal(&numeric(1, -2, 0, 6, &[1200])), dec("0.000012"));
        // 0.00000012 is weight -2 with digit group 12.
        assert_eq!(decimal(&numeric(1, -2, 0, 8, &[12])), dec("0.00000012"));
        // 0.000000000345 is weight -3 with digit group 3450.
        assert_eq!(decimal(&numeric(1, -3, 0, 12, &[3450])), dec("0.000000000345"));
    }

    #[test]
    fn test_numeric_out_of_range_passes_raw_bytes() {
        for raw in [
            numeric(0, 0, 0xC000, 0, &[]),
            numeric(0, 0, 0xD000, 0, &[]),
            numeric(0, 0, 0xF000, 0, &[]),
        ] {
            assert_eq!(decode(&raw), RawValue::Bytes(raw.clone()));
        }
    }

    #[test]
    fn test_numeric_accepts_only_numeric() {
        assert!(<PgNumeric as FromSql>::accepts(&Type::NUMERIC));
        assert!(!<PgNumeric as FromSql>::accepts(&Type::FLOAT8));
    }

    #[test]
    fn test_procedure_name_validation() {
        assert!(validate_procedure_name("rs_medicare_partc_outer").is_ok());
        assert!(validate_procedure_name("scoring.rs_medicare_partc_outer").is_ok());
        assert!(validate_procedure_name("").is_err());
        assert!(validate_procedure_name("1abc").is_err());
        assert!(validate_procedure_name("a.b.c").is_err());
        assert!(validate_procedure_name("x(); DROP TABLE members; --").is_err());
        assert!(validate_procedure_name(&"a".repeat(200)).is_err());
    }

    #[test]
    fn test_transient_sqlstates() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("53300"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("40001"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(!is_transient_sqlstate("57014"));
        assert!(!is_transient_sqlstate("42883"));
        assert!(!is_transient_sqlstate("22P02"));
    }

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.procedure, "rs_medicare_partc_outer");
        assert!(config.statement_timeout.is_none());
    }

    #[test]
    fn test_staging_param_accepts() {
        assert!(<StagingParam<'_> as ToSql>::accepts(&Type::VARCHAR));
        assert!(<StagingParam<'_> as ToSql>::accepts(&Type::DATE));
        assert!(!<StagingParam<'_> as ToSql>::accepts(&Type::INT4));
    }
}
