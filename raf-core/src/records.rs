//! Scoring request records
//!
//! Wire names follow the scoring engine's column names (`MemberID`, `DOB`,
//! `DxCode`, ...). Unknown fields are rejected at deserialization time and
//! field lengths are bounded by the staging table columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RecordSection, ValidationError};

// ============================================================================
// FIELD LIMITS
// ============================================================================

/// `MemberID VARCHAR(50)`
pub const MEMBER_ID_MAX_LEN: usize = 50;
/// `Gender VARCHAR(1)`
pub const GENDER_MAX_LEN: usize = 1;
/// `RAType VARCHAR(10)`
pub const RA_TYPE_MAX_LEN: usize = 10;
/// `OREC VARCHAR(1)`
pub const OREC_MAX_LEN: usize = 1;
/// `DxCode VARCHAR(20)`
pub const DX_CODE_MAX_LEN: usize = 20;

/// Highest payment year that still renders as a four digit year.
pub const MAX_PAYMENT_YEAR: i32 = 9999;

// ============================================================================
// FLAG
// ============================================================================

/// Single-character yes/no indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Flag {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Yes => "Y",
            Flag::No => "N",
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value {
            Flag::Yes
        } else {
            Flag::No
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One member's enrollment facts for the payment year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct MembershipRecord {
    #[serde(rename = "MemberID")]
    pub member_id: String,
    #[serde(rename = "DOB", alias = "BirthDate")]
    pub birth_date: NaiveDate,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "RAType")]
    pub ra_type: String,
    #[serde(rename = "Hospice")]
    pub hospice: Flag,
    #[serde(rename = "LTIMCAID")]
    pub ltimcaid: Flag,
    #[serde(rename = "NEMCAID")]
    pub nemcaid: Flag,
    #[serde(rename = "OREC")]
    pub orec: String,
}

/// One diagnosis code observed for a member over a service date range.
///
/// `FromDOS <= ThruDOS` is expected but not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct DiagnosisRecord {
    #[serde(rename = "MemberID")]
    pub member_id: String,
    #[serde(rename = "FromDOS")]
    pub from_dos: NaiveDate,
    #[serde(rename = "ThruDOS")]
    pub thru_dos: NaiveDate,
    #[serde(rename = "DxCode")]
    pub dx_code: String,
}

/// A complete scoring request. Read-only once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct ScoringRequest {
    pub payment_year: i32,
    pub memberships: Vec<MembershipRecord>,
    pub diagnoses: Vec<DiagnosisRecord>,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn require(
    value: &str,
    section: RecordSection,
    index: usize,
    field: &'static str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            section,
            index,
            field,
        });
    }
    Ok(())
}

fn bounded(
    value: &str,
    max: usize,
    section: RecordSection,
    index: usize,
    field: &'static str,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong {
            section,
            index,
            field,
            len,
            max,
        });
    }
    Ok(())
}

impl MembershipRecord {
    /// Check the record at position `index` of its request.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let section = RecordSection::Membership;
        require(&self.member_id, section, index, "MemberID")?;
        bounded(&self.member_id, MEMBER_ID_MAX_LEN, section, index, "MemberID")?;
        bounded(&self.gender, GENDER_MAX_LEN, section, index, "Gender")?;
        bounded(&self.ra_type, RA_TYPE_MAX_LEN, section, index, "RAType")?;
        bounded(&self.orec, OREC_MAX_LEN, section, index, "OREC")?;
        Ok(())
    }
}

impl DiagnosisRecord {
    /// Check the record at position `index` of its request.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let section = RecordSection::Diagnosis;
        require(&self.member_id, section, index, "MemberID")?;
        bounded(&self.member_id, MEMBER_ID_MAX_LEN, section, index, "MemberID")?;
        require(&self.dx_code, section, index, "DxCode")?;
        bounded(&self.dx_code, DX_CODE_MAX_LEN, section, index, "DxCode")?;
        Ok(())
    }
}

impl ScoringRequest {
    /// Validate request shape. Stops at the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payment_year <= 0 || self.payment_year > MAX_PAYMENT_YEAR {
            return Err(ValidationError::InvalidPaymentYear {
                year: self.payment_year,
                reason: format!("must be between 1 and {}", MAX_PAYMENT_YEAR),
            });
        }
        for (index, membership) in self.memberships.iter().enumerate() {
            membership.validate(index)?;
        }
        for (index, diagnosis) in self.diagnoses.iter().enumerate() {
            diagnosis.validate(index)?;
        }
        Ok(())
    }

    /// Total number of records carried by the request.
    pub fn record_count(&self) -> usize {
        self.memberships.len() + self.diagnoses.len()
    }
}
