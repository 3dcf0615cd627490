//! Error types for scoring operations

use std::fmt;
use thiserror::Error;

/// Record collection a validation failure points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSection {
    Membership,
    Diagnosis,
}

impl RecordSection {
    /// Wire name of the collection in a scoring request.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSection::Membership => "memberships",
            RecordSection::Diagnosis => "diagnoses",
        }
    }
}

impl fmt::Display for RecordSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request shape violations, detected before fingerprinting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid payment year {year}: {reason}")]
    InvalidPaymentYear { year: i32, reason: String },

    #[error("Required field missing: {section}[{index}].{field}")]
    RequiredFieldMissing {
        section: RecordSection,
        index: usize,
        field: &'static str,
    },

    #[error("Field {section}[{index}].{field} has {len} characters, limit is {max}")]
    FieldTooLong {
        section: RecordSection,
        index: usize,
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    /// Section and record index the error refers to, if any.
    pub fn location(&self) -> Option<(RecordSection, usize, &'static str)> {
        match self {
            ValidationError::RequiredFieldMissing {
                section,
                index,
                field,
            }
            | ValidationError::FieldTooLong {
                section,
                index,
                field,
                ..
            } => Some((*section, *index, *field)),
            _ => None,
        }
    }
}

/// Failures reported by a scoring engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Connectivity or transient failure; the same call may succeed later.
    #[error("Scoring engine unavailable: {reason}")]
    Unavailable { reason: String },

    /// The engine ran and reported an error for this input.
    #[error("Scoring engine failed: {message}")]
    Failed { message: String },
}

impl EngineError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Only unavailability is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unavailable { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// A result value that could not be converted and was passed through raw.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Column {column} at row {row} was passed through raw: {reason}")]
pub struct NormalizationAnomaly {
    pub row: usize,
    pub column: String,
    pub reason: String,
}

/// Master error type for a scoring request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Scoring collaborator unavailable: {reason}")]
    CollaboratorUnavailable { reason: String },

    #[error("Scoring collaborator error: {message}")]
    CollaboratorError { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scoring cache lock poisoned")]
    LockPoisoned,

    #[error("Computation for {fingerprint} ended without a result")]
    ComputationAbandoned { fingerprint: String },
}

impl From<EngineError> for ScoringError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable { reason } => ScoringError::CollaboratorUnavailable { reason },
            EngineError::Failed { message } => ScoringError::CollaboratorError { message },
        }
    }
}

/// Result type for scoring operations.
pub type ScoringResult<T> = Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_retryability() {
        assert!(EngineError::unavailable("connection refused").is_retryable());
        assert!(!EngineError::failed("divide by zero").is_retryable());
    }

    #[test]
    fn test_engine_error_conversion() {
        let unavailable = ScoringError::from(EngineError::unavailable("pool closed"));
        assert_eq!(
            unavailable,
            ScoringError::CollaboratorUnavailable {
                reason: "pool closed".to_string()
            }
        );

        let failed = ScoringError::from(EngineError::failed("bad payment year"));
        assert!(matches!(failed, ScoringError::CollaboratorError { .. }));
    }

    #[test]
    fn test_validation_error_location() {
        let err = ValidationError::FieldTooLong {
            section: RecordSection::Diagnosis,
            index: 3,
            field: "DxCode",
            len: 25,
            max: 20,
        };
        assert_eq!(err.location(), Some((RecordSection::Diagnosis, 3, "DxCode")));

        let msg = err.to_string();
        assert!(msg.contains("diagnoses[3].DxCode"));
        assert!(msg.contains("limit is 20"));

        let year = ValidationError::InvalidPaymentYear {
            year: 0,
            reason: "must be positive".to_string(),
        };
        assert_eq!(year.location(), None);
    }

    #[test]
    fn test_validation_converts_to_invalid_input() {
        let err: ScoringError = ValidationError::InvalidValue {
            field: "payment_year".to_string(),
            reason: "out of range".to_string(),
        }
        .into();
        assert!(matches!(err, ScoringError::InvalidInput(_)));
    }
}
