//! Staging batch encoder
//!
//! Splits an ordered record slice into bounded chunks and renders each chunk
//! as one parameterized multi-row `INSERT` into a session staging table.
//! Record values travel only as bind parameters, never as statement text.
//!
//! Encoding is lazy: a batch is rendered when the iterator reaches it, and
//! the iterator can be cloned or rebuilt to replay the same sequence.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::records::{DiagnosisRecord, MembershipRecord, ScoringRequest};

/// Records per staging batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Bind parameter limit of a single Postgres statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

// ============================================================================
// STAGING SCHEMA
// ============================================================================

/// Column of a staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn column(name: &'static str, sql_type: &'static str) -> StagingColumn {
    StagingColumn { name, sql_type }
}

const MEMBERSHIP_COLUMNS: &[StagingColumn] = &[
    column("member_id", "VARCHAR(50) NOT NULL"),
    column("birth_date", "DATE NOT NULL"),
    column("gender", "VARCHAR(1)"),
    column("ra_type", "VARCHAR(10)"),
    column("hospice", "VARCHAR(1)"),
    column("ltimcaid", "VARCHAR(1)"),
    column("nemcaid", "VARCHAR(1)"),
    column("orec", "VARCHAR(1)"),
];

const DIAGNOSIS_COLUMNS: &[StagingColumn] = &[
    column("member_id", "VARCHAR(50) NOT NULL"),
    column("from_dos", "DATE NOT NULL"),
    column("thru_dos", "DATE NOT NULL"),
    column("dx_code", "VARCHAR(20) NOT NULL"),
];

/// Session-scoped tables the scoring procedure reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingTable {
    Membership,
    Diagnosis,
}

impl StagingTable {
    pub const ALL: [StagingTable; 2] = [StagingTable::Membership, StagingTable::Diagnosis];

    pub fn name(&self) -> &'static str {
        match self {
            StagingTable::Membership => "temp_membership",
            StagingTable::Diagnosis => "temp_diagnosis",
        }
    }

    pub fn columns(&self) -> &'static [StagingColumn] {
        match self {
            StagingTable::Membership => MEMBERSHIP_COLUMNS,
            StagingTable::Diagnosis => DIAGNOSIS_COLUMNS,
        }
    }

    /// DDL for the table; it is dropped when the enclosing transaction ends.
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TEMP TABLE {} ({}) ON COMMIT DROP",
            self.name(),
            columns
        )
    }

    /// Largest batch whose parameters fit in one statement.
    pub fn max_batch_size(&self) -> usize {
        MAX_BIND_PARAMETERS / self.columns().len()
    }
}

// ============================================================================
// VALUES
// ============================================================================

/// A single bind parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingValue {
    Text(String),
    Date(NaiveDate),
}

/// Records that can be staged into a [`StagingTable`].
pub trait StagingRecord {
    const TABLE: StagingTable;

    /// Values in the table's column order.
    fn staging_values(&self) -> Vec<StagingValue>;
}

impl StagingRecord for MembershipRecord {
    const TABLE: StagingTable = StagingTable::Membership;

    fn staging_values(&self) -> Vec<StagingValue> {
        vec![
            StagingValue::Text(self.member_id.clone()),
            StagingValue::Date(self.birth_date),
            StagingValue::Text(self.gender.clone()),
            StagingValue::Text(self.ra_type.clone()),
            StagingValue::Text(self.hospice.as_str().to_string()),
            StagingValue::Text(self.ltimcaid.as_str().to_string()),
            StagingValue::Text(self.nemcaid.as_str().to_string()),
            StagingValue::Text(self.orec.clone()),
        ]
    }
}

impl StagingRecord for DiagnosisRecord {
    const TABLE: StagingTable = StagingTable::Diagnosis;

    fn staging_values(&self) -> Vec<StagingValue> {
        vec![
            StagingValue::Text(self.member_id.clone()),
            StagingValue::Date(self.from_dos),
            StagingValue::Date(self.thru_dos),
            StagingValue::Text(self.dx_code.clone()),
        ]
    }
}

// ============================================================================
// BATCHES
// ============================================================================

/// One chunk of records rendered as a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch<'a, R> {
    /// Zero-based position of this batch in the sequence.
    pub index: usize,
    pub table: StagingTable,
    pub records: &'a [R],
    pub statement: String,
    pub params: Vec<StagingValue>,
}

impl<R> EncodedBatch<'_, R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lazy sequence of [`EncodedBatch`] values over a record slice.
#[derive(Debug)]
pub struct Batches<'a, R> {
    records: &'a [R],
    batch_size: usize,
    next_index: usize,
}

impl<R> Clone for Batches<'_, R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records,
            batch_size: self.batch_size,
            next_index: self.next_index,
        }
    }
}

impl<'a, R: StagingRecord> Iterator for Batches<'a, R> {
    type Item = EncodedBatch<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_index.checked_mul(self.batch_size)?;
        if start >= self.records.len() {
            return None;
        }
        let end = (start + self.batch_size).min(self.records.len());
        let chunk = &self.records[start..end];

        let index = self.next_index;
        self.next_index += 1;

        let mut params = Vec::with_capacity(chunk.len() * R::TABLE.columns().len());
        for record in chunk {
            params.extend(record.staging_values());
        }

        Some(EncodedBatch {
            index,
            table: R::TABLE,
            records: chunk,
            statement: insert_statement(R::TABLE, chunk.len()),
            params,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.records.len().div_ceil(self.batch_size);
        let remaining = total.saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl<R: StagingRecord> ExactSizeIterator for Batches<'_, R> {}

/// Render `INSERT INTO <table> (<cols>) VALUES ($1, ...), (...)` for `rows` rows.
pub fn insert_statement(table: StagingTable, rows: usize) -> String {
    let columns = table.columns();
    let names = columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");

    let mut statement = format!("INSERT INTO {} ({}) VALUES ", table.name(), names);
    let mut placeholder = 1usize;
    for row in 0..rows {
        if row > 0 {
            statement.push_str(", ");
        }
        statement.push('(');
        for col in 0..columns.len() {
            if col > 0 {
                statement.push_str(", ");
            }
            // Writing to a String cannot fail.
            let _ = write!(statement, "${}", placeholder);
            placeholder += 1;
        }
        statement.push(')');
    }
    statement
}

/// Check that `batch_size` is usable for `table`.
pub fn validate_batch_size(table: StagingTable, batch_size: usize) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > table.max_batch_size() {
        return Err(ConfigError::InvalidValue {
            field: "batch_size".to_string(),
            value: batch_size.to_string(),
            reason: format!(
                "must be between 1 and {} for {}",
                table.max_batch_size(),
                table.name()
            ),
        });
    }
    Ok(())
}

/// Encode `records` into batches of at most `batch_size`.
///
/// Empty input yields an empty sequence.
pub fn encode<R: StagingRecord>(
    records: &[R],
    batch_size: usize,
) -> Result<Batches<'_, R>, ConfigError> {
    validate_batch_size(R::TABLE, batch_size)?;
    Ok(Batches {
        records,
        batch_size,
        next_index: 0,
    })
}

// ============================================================================
// STAGING PLAN
// ============================================================================

/// A request together with a batch size valid for every staging table.
///
/// Engines receive this instead of the raw request so batch sizing is
/// checked once, before any work reaches the database.
#[derive(Debug, Clone)]
pub struct StagingPlan {
    request: Arc<ScoringRequest>,
    batch_size: usize,
}

impl StagingPlan {
    pub fn new(request: Arc<ScoringRequest>, batch_size: usize) -> Result<Self, ConfigError> {
        for table in StagingTable::ALL {
            validate_batch_size(table, batch_size)?;
        }
        Ok(Self {
            request,
            batch_size,
        })
    }

    pub fn request(&self) -> &ScoringRequest {
        &self.request
    }

    pub fn payment_year(&self) -> i32 {
        self.request.payment_year
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn membership_batches(&self) -> Batches<'_, MembershipRecord> {
        Batches {
            records: &self.request.memberships,
            batch_size: self.batch_size,
            next_index: 0,
        }
    }

    pub fn diagnosis_batches(&self) -> Batches<'_, DiagnosisRecord> {
        Batches {
            records: &self.request.diagnoses,
            batch_size: self.batch_size,
            next_index: 0,
        }
    }

    /// Number of insert statements the plan will issue.
    pub fn batch_count(&self) -> usize {
        self.membership_batches().len() + self.diagnosis_batches().len()
    }
}
