//! # Error Types
//!
//! Domain-specific error types for dte-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dte-core errors (this file)                                           │
//! │  ├── CoreError        - Composition / domain failures                  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dte-db errors (separate crate)                                        │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  dte-emit errors (separate crate)                                      │
//! │  └── EmitError        - What the caller of an emission sees            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EmitError → Caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line item reached the composer with values it cannot price.
    ///
    /// ## When This Occurs
    /// When the caller skipped `validate_sale_request`, or when an amount
    /// falls outside the range `Decimal` can represent.
    #[error("Invalid line item #{index}: {reason}")]
    InvalidLineItem { index: usize, reason: String },

    /// The last control number stored for the issuer cannot be continued.
    #[error("Invalid control number '{value}': {reason}")]
    InvalidControlNumber { value: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any external call is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value exceeds the allowed maximum.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: String },

    /// Collection exceeds the allowed size.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },

    /// Invalid format (e.g., a control number without a sequence).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidLineItem {
            index: 2,
            reason: "quantity must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid line item #2: quantity must be positive"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "cliente_id".to_string(),
        };
        assert_eq!(err.to_string(), "cliente_id is required");

        let err = ValidationError::TooMany {
            field: "detalles".to_string(),
            max: 2000,
        };
        assert_eq!(err.to_string(), "detalles cannot have more than 2000 entries");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "detalles".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
