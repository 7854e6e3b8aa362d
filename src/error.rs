//! Error types for suitcast.
//!
//! The decision path never fails: missing data, cooldowns and thin samples
//! are plain `None`/empty results. Errors exist for the edges of the crate:
//! configuration, parsing and persistence.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid card: '{input}'")]
    InvalidCard {
        input: String,
    },

    #[error("Invalid suit: '{input}'")]
    InvalidSuit {
        input: String,
    },

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for suitcast.
#[derive(Debug, Error)]
pub enum SuitcastError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SuitcastError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Validation errors won't change on retry
            Self::Storage(e) => matches!(e, StorageError::Locked(_) | StorageError::BackendError(_)),
        }
    }
}

/// Result type alias for suitcast operations.
pub type SuitcastResult<T> = Result<T, SuitcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_card() {
        let err = ValidationError::InvalidCard {
            input: "Z♠".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Z♠"));
        assert!(msg.contains("Invalid card"));
    }

    #[test]
    fn test_validation_error_config() {
        let err = ValidationError::config("round_spacing", "must be at least 1");
        let msg = format!("{err}");
        assert!(msg.contains("round_spacing"));
        assert!(msg.contains("at least 1"));
    }

    #[test]
    fn test_error_from_validation() {
        let err: SuitcastError = ValidationError::InvalidSuit {
            input: "?".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_from_storage() {
        let err: SuitcastError = StorageError::Locked("state dir".to_string()).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());

        let err: SuitcastError = StorageError::SerializationError("bad json".to_string()).into();
        assert!(!err.is_retryable());
    }
}
