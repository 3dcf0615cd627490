//! Result normalization
//!
//! The scoring engine returns loosely typed rows. Every value is mapped to a
//! JSON-safe scalar:
//!
//! | raw                              | normalized            |
//! |----------------------------------|-----------------------|
//! | decimal, integer, float          | `f64` number          |
//! | date, time, timestamp            | ISO-8601 string       |
//! | null or missing                  | `null`                |
//! | anything else                    | best-effort string    |
//!
//! A value that cannot be converted is passed through raw and reported as a
//! [`NormalizationAnomaly`]; the row itself always succeeds.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::NormalizationAnomaly;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ============================================================================
// RAW VALUES
// ============================================================================

/// A value as decoded from the scoring engine, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    /// Arbitrary-precision decimal in its textual form.
    Decimal(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// Column names plus raw rows, in engine order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<RawValue>) -> Self {
        self.rows.push(row);
        self
    }
}

// ============================================================================
// NORMALIZED VALUES
// ============================================================================

/// A JSON-safe result value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreValue {
    Number(f64),
    Text(String),
    Null,
    /// Value that could not be converted, kept as-is.
    Raw(serde_json::Value),
}

impl Serialize for ScoreValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScoreValue::Number(n) => serializer.serialize_f64(*n),
            ScoreValue::Text(s) => serializer.serialize_str(s),
            ScoreValue::Null => serializer.serialize_none(),
            ScoreValue::Raw(v) => v.serialize(serializer),
        }
    }
}

/// One normalized result row. Column order is the engine's order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringResultRow {
    values: Vec<(Arc<str>, ScoreValue)>,
}

impl ScoringResultRow {
    pub fn get(&self, column: &str) -> Option<&ScoreValue> {
        self.values
            .iter()
            .find(|(name, _)| name.as_ref() == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScoreValue)> {
        self.values.iter().map(|(name, value)| (name.as_ref(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ScoringResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name.as_ref(), value)?;
        }
        map.end()
    }
}

/// Normalized rows plus whatever had to be passed through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResult {
    pub rows: Vec<ScoringResultRow>,
    pub anomalies: Vec<NormalizationAnomaly>,
}

// ============================================================================
// NORMALIZER
// ============================================================================

fn normalize_value(value: RawValue) -> Result<ScoreValue, (ScoreValue, String)> {
    match value {
        RawValue::Null => Ok(ScoreValue::Null),
        RawValue::Integer(i) => Ok(ScoreValue::Number(i as f64)),
        RawValue::Float(f) if f.is_finite() => Ok(ScoreValue::Number(f)),
        RawValue::Float(f) => Err((
            ScoreValue::Text(f.to_string()),
            "non-finite float has no JSON number form".to_string(),
        )),
        RawValue::Decimal(text) => match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(ScoreValue::Number(n)),
            _ => Err((
                ScoreValue::Text(text.clone()),
                format!("decimal {} is not a finite number", text),
            )),
        },
        RawValue::Date(d) => Ok(ScoreValue::Text(d.format(DATE_FORMAT).to_string())),
        RawValue::Time(t) => Ok(ScoreValue::Text(t.format(TIME_FORMAT).to_string())),
        RawValue::Timestamp(ts) => Ok(ScoreValue::Text(ts.format(DATETIME_FORMAT).to_string())),
        RawValue::TimestampTz(ts) => Ok(ScoreValue::Text(
            ts.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        )),
        RawValue::Bool(b) => Ok(ScoreValue::Text(b.to_string())),
        RawValue::Text(s) => Ok(ScoreValue::Text(s)),
        RawValue::Json(v) => Ok(ScoreValue::Text(v.to_string())),
        RawValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => Ok(ScoreValue::Text(s)),
            Err(e) => {
                let raw = e
                    .into_bytes()
                    .into_iter()
                    .map(serde_json::Value::from)
                    .collect();
                Err((
                    ScoreValue::Raw(serde_json::Value::Array(raw)),
                    "bytes are not valid UTF-8".to_string(),
                ))
            }
        },
    }
}

/// Normalize one raw row against the engine's column names.
///
/// The output has exactly one entry per column. Missing trailing values
/// become `null`; surplus values are dropped and reported.
pub fn normalize(
    row_index: usize,
    raw_row: Vec<RawValue>,
    columns: &[Arc<str>],
) -> (ScoringResultRow, Vec<NormalizationAnomaly>) {
    let mut anomalies = Vec::new();
    let surplus = raw_row.len().saturating_sub(columns.len());
    if surplus > 0 {
        anomalies.push(NormalizationAnomaly {
            row: row_index,
            column: format!("#{}", columns.len()),
            reason: format!("{} value(s) without a column name dropped", surplus),
        });
    }

    let mut raw = raw_row.into_iter();
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        let value = match raw.next().map(normalize_value) {
            None => ScoreValue::Null,
            Some(Ok(value)) => value,
            Some(Err((passthrough, reason))) => {
                anomalies.push(NormalizationAnomaly {
                    row: row_index,
                    column: column.to_string(),
                    reason,
                });
                passthrough
            }
        };
        values.push((Arc::clone(column), value));
    }

    (ScoringResultRow { values }, anomalies)
}

/// Normalize every row of a result set.
pub fn normalize_result_set(set: RawResultSet) -> NormalizedResult {
    let columns: Vec<Arc<str>> = set.columns.into_iter().map(Arc::from).collect();
    let mut result = NormalizedResult {
        rows: Vec::with_capacity(set.rows.len()),
        anomalies: Vec::new(),
    };
    for (index, raw_row) in set.rows.into_iter().enumerate() {
        let (row, anomalies) = normalize(index, raw_row, &columns);
        result.rows.push(row);
        result.anomalies.extend(anomalies);
    }
    result
}
