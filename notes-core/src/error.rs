//! Error types for the notes service.

use crate::entities::EntityType;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity_type} with {field} '{value}' already exists")]
    Duplicate {
        entity_type: EntityType,
        field: String,
        value: String,
    },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: i64 },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Corrupt row: {reason}")]
    CorruptRow { reason: String },
}

/// Key-value store errors (cache and rate-limit counters).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("Key-value store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Key-value command failed: {reason}")]
    Command { reason: String },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be at least {min} characters (got {actual})")]
    TooShort {
        field: String,
        min: usize,
        actual: usize,
    },

    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidValue { field, .. } => field,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for the notes service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotesError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key-value error: {0}")]
    Kv(#[from] KvError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for notes operations.
pub type NotesResult<T> = Result<T, NotesError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_duplicate() {
        let err = StorageError::Duplicate {
            entity_type: EntityType::User,
            field: "username".to_string(),
            value: "alice".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("User"));
        assert!(msg.contains("username"));
        assert!(msg.contains("alice"));
    }

    #[test]
    fn test_validation_error_display_too_long() {
        let err = ValidationError::TooLong {
            field: "title".to_string(),
            max: 100,
            actual: 101,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("title"));
        assert!(msg.contains("100"));
        assert!(msg.contains("101"));
        assert_eq!(err.field(), "title");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "NOTES_STORAGE".to_string(),
            value: "sqlite".to_string(),
            reason: "expected postgres or memory".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("NOTES_STORAGE"));
        assert!(msg.contains("sqlite"));
    }

    #[test]
    fn test_notes_error_from_conversions() {
        let err: NotesError = KvError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, NotesError::Kv(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
