//! Error Types for the RAF API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON `{code, message, timestamp, details?}`
//! with the status code of their category.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use raf_core::{ConfigError, ScoringError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur while serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors (4xx)
    // ========================================================================
    /// Request body is malformed or fails validation
    InvalidInput,

    /// Request body exceeds the configured limit
    PayloadTooLarge,

    /// No route matches the request
    NotFound,

    // ========================================================================
    // Collaborator Errors (502, 503)
    // ========================================================================
    /// Scoring engine could not be reached, even after a retry
    CollaboratorUnavailable,

    /// Scoring engine ran and reported an error
    CollaboratorError,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed outside a scoring computation
    DatabaseError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::CollaboratorError => StatusCode::BAD_GATEWAY,

            ErrorCode::CollaboratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::PayloadTooLarge => "Request body too large",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::CollaboratorUnavailable => "Scoring engine unavailable",
            ErrorCode::CollaboratorError => "Scoring engine reported an error",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// When the error was produced
    pub timestamp: DateTime<Utc>,

    /// Optional additional details (offending record, field, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn collaborator_unavailable(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::CollaboratorUnavailable,
            format!("Scoring engine unavailable: {}", reason),
        )
    }

    pub fn collaborator_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CollaboratorError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
///
/// ```ignore
/// async fn handler() -> Result<Json<Response>, ApiError> {
///     Err(ApiError::invalid_input("payment_year must be positive"))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// Validation failures carry the offending location in `details`.
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let details = match &err {
            ValidationError::InvalidPaymentYear { year, .. } => {
                json!({ "field": "payment_year", "value": year })
            }
            ValidationError::InvalidValue { field, .. } => json!({ "field": field }),
            _ => match err.location() {
                Some((section, index, field)) => json!({
                    "section": section.as_str(),
                    "index": index,
                    "field": field,
                }),
                None => serde_json::Value::Null,
            },
        };
        ApiError::invalid_input(err.to_string()).with_details(details)
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!(error = %err, "Configuration error");
        ApiError::internal_error(err.to_string())
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::InvalidInput(validation) => validation.into(),
            ScoringError::CollaboratorUnavailable { reason } => {
                tracing::warn!(%reason, "Scoring engine unavailable");
                ApiError::collaborator_unavailable(reason)
            }
            ScoringError::CollaboratorError { message } => {
                tracing::warn!(%message, "Scoring engine reported an error");
                ApiError::collaborator_error(message)
            }
            ScoringError::Config(config) => config.into(),
            ScoringError::LockPoisoned => {
                tracing::error!("Scoring cache lock poisoned");
                ApiError::internal_error("Scoring cache is unavailable")
            }
            ScoringError::ComputationAbandoned { fingerprint } => {
                tracing::error!(%fingerprint, "Scoring computation ended without a result");
                ApiError::internal_error("Scoring computation ended without a result")
                    .with_details(json!({ "fingerprint": fingerprint }))
            }
        }
    }
}

/// Body extraction failures become client errors; oversize bodies keep 413.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::payload_too_large(rejection.body_text());
        }
        ApiError::invalid_input(rejection.body_text())
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
