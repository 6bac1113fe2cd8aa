//! # Emission Error Type
//!
//! What the caller of an emission sees when it fails.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variant        Raised by              Status   Caller-correctable?    │
//! │  ─────────────  ─────────────────────  ───────  ──────────────────     │
//! │  Validation     Validate step          400      yes                    │
//! │  NotFound       LoadReferences         404      yes                    │
//! │  Auth           TokenCache             502      no                     │
//! │  Signing        SigningClient          502      no                     │
//! │  Submission     ReceptionClient        upstream status, else 502       │
//! │  Cancelled      any step before Submit 499      -                      │
//! │  Store/Compose/ internal               500      no                     │
//! │  Serialization/                                                        │
//! │  Config                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ErrorResponse`] is the serializable form, with a machine-readable `code`
//! and a message safe to show the operator.

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use dte_core::{CoreError, ValidationError};
use dte_db::DbError;

/// Errors from the emission pipeline.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Caller input was rejected before anything left the process.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Issuer configuration or client record is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// No authority token could be obtained.
    #[error("Authentication failed: {message}")]
    Auth { status: Option<u16>, message: String },

    /// The local signer failed; the upstream message is kept.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The authority rejected the envelope or could not be reached.
    ///
    /// `status` and `body` are present when the authority answered with an
    /// HTTP error.
    #[error("Submission failed: {message}")]
    Submission {
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    /// Database failure other than a missing record.
    #[error("Store error: {0}")]
    Store(DbError),

    /// The composer refused the input.
    #[error("Composition failed: {0}")]
    Compose(CoreError),

    /// JSON encoding or decoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled before the envelope was dispatched.
    #[error("Emission cancelled")]
    Cancelled,
}

impl EmitError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EmitError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        EmitError::Auth {
            status: None,
            message: message.into(),
        }
    }

    /// Transport failure talking to the authority (no HTTP status).
    pub fn unreachable(message: impl Into<String>) -> Self {
        EmitError::Submission {
            status: None,
            body: None,
            message: message.into(),
        }
    }

    /// HTTP-equivalent status for the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            EmitError::Validation(_) => 400,
            EmitError::NotFound { .. } => 404,
            EmitError::Submission {
                status: Some(status),
                ..
            } => *status,
            EmitError::Submission { status: None, .. } => 502,
            EmitError::Auth { .. } | EmitError::Signing(_) => 502,
            EmitError::Cancelled => 499,
            EmitError::Store(_)
            | EmitError::Compose(_)
            | EmitError::Serialization(_)
            | EmitError::Config(_) => 500,
        }
    }

    /// Machine-readable code.
    pub fn kind(&self) -> ErrorCode {
        match self {
            EmitError::Validation(_) => ErrorCode::ValidationError,
            EmitError::NotFound { .. } => ErrorCode::NotFound,
            EmitError::Auth { .. } => ErrorCode::AuthError,
            EmitError::Signing(_) => ErrorCode::SigningError,
            EmitError::Submission { .. } => ErrorCode::SubmissionError,
            EmitError::Cancelled => ErrorCode::Cancelled,
            EmitError::Store(_) => ErrorCode::DatabaseError,
            EmitError::Config(_) => ErrorCode::ConfigError,
            EmitError::Compose(_) | EmitError::Serialization(_) => ErrorCode::Internal,
        }
    }

    /// Serializable form for the caller.
    ///
    /// Authority HTTP errors carry the upstream body; other submission
    /// failures and internal errors get a generic message and are logged.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            EmitError::Submission {
                status: Some(_),
                message,
                ..
            } => message.clone(),
            EmitError::Submission { status: None, message, .. } => {
                error!(detail = %message, "Authority unreachable");
                "Could not reach the tax authority".to_string()
            }
            EmitError::Store(e) => {
                error!("Database error during emission: {}", e);
                "Database operation failed".to_string()
            }
            EmitError::Compose(_) | EmitError::Serialization(_) => {
                error!("Internal emission error: {}", self);
                "Internal error while building the document".to_string()
            }
            other => other.to_string(),
        };

        let upstream = match self {
            EmitError::Submission { body: Some(body), .. } => Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            ),
            _ => None,
        };

        ErrorResponse {
            code: self.kind(),
            status: self.status_code(),
            message,
            upstream,
        }
    }
}

/// Error codes for emission responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,
    /// Issuer or client missing (404)
    NotFound,
    /// Authority token unavailable (502)
    AuthError,
    /// Local signer failed (502)
    SigningError,
    /// Authority rejected or unreachable
    SubmissionError,
    /// Caller cancelled (499)
    Cancelled,
    /// Database failure (500)
    DatabaseError,
    /// Bad or missing configuration (500)
    ConfigError,
    /// Anything else (500)
    Internal,
}

/// What a failed emission serializes to.
///
/// ```json
/// {
///   "code": "SUBMISSION_ERROR",
///   "status": 400,
///   "message": "Authority rejected the document (HTTP 400)",
///   "upstream": { "estado": "RECHAZADO", "descripcionMsg": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_json::Value>,
}

/// Missing records become `NotFound`; everything else is a store failure.
impl From<DbError> for EmitError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EmitError::NotFound { entity, id },
            other => EmitError::Store(other),
        }
    }
}

impl From<CoreError> for EmitError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => EmitError::Validation(v),
            other => EmitError::Compose(other),
        }
    }
}

/// Result type for emission operations.
pub type EmitResult<T> = Result<T, EmitError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let validation = EmitError::from(ValidationError::Required {
            field: "cliente_id".to_string(),
        });
        assert_eq!(validation.status_code(), 400);
        assert_eq!(EmitError::not_found("Client", "3").status_code(), 404);
        assert_eq!(EmitError::auth("down").status_code(), 502);
        assert_eq!(EmitError::Signing("bad".into()).status_code(), 502);
        assert_eq!(EmitError::unreachable("reset").status_code(), 502);
        assert_eq!(EmitError::Cancelled.status_code(), 499);
        assert_eq!(EmitError::Config("x".into()).status_code(), 500);

        let rejected = EmitError::Submission {
            status: Some(400),
            body: Some("{}".into()),
            message: "rejected".into(),
        };
        assert_eq!(rejected.status_code(), 400);
    }

    #[test]
    fn test_db_not_found_maps_to_not_found() {
        let err: EmitError = DbError::not_found("IssuerConfig", "1").into();
        assert!(matches!(err, EmitError::NotFound { .. }));
        assert_eq!(err.kind(), ErrorCode::NotFound);

        let err: EmitError = DbError::PoolExhausted.into();
        assert!(matches!(err, EmitError::Store(_)));
    }

    #[test]
    fn test_response_carries_upstream_body() {
        let err = EmitError::Submission {
            status: Some(400),
            body: Some(r#"{"estado":"RECHAZADO"}"#.into()),
            message: "Authority rejected the document (HTTP 400)".into(),
        };
        let response = err.to_response();
        assert_eq!(response.status, 400);
        assert_eq!(response.upstream.unwrap()["estado"], "RECHAZADO");

        let json = serde_json::to_value(EmitError::Cancelled.to_response()).unwrap();
        assert_eq!(json["code"], "CANCELLED");
        assert!(json.get("upstream").is_none());
    }

    #[test]
    fn test_unreachable_gets_generic_message() {
        let response = EmitError::unreachable("tcp connect error 10.0.0.1:443").to_response();
        assert_eq!(response.message, "Could not reach the tax authority");
        assert_eq!(response.code, ErrorCode::SubmissionError);
    }
}
