//! Error Types for the notes API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notes_core::{ConfigError, KvError, NotesError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Username or password did not match
    InvalidCredentials,

    /// Request is authenticated but lacks permission for the resource
    Forbidden,

    /// Authentication token is invalid or malformed
    InvalidToken,

    /// Authentication token has expired
    TokenExpired,

    // ========================================================================
    // Client Errors (400, 404, 422, 429)
    // ========================================================================
    /// Username is already registered
    UsernameTaken,

    /// Request body or query failed validation
    ValidationFailed,

    /// Field value is out of valid range
    InvalidRange,

    /// Requested entity does not exist or is not visible to the caller
    NotFound,

    /// Request rate limit exceeded
    RateLimited,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized
            | ErrorCode::InvalidCredentials
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::UsernameTaken => StatusCode::BAD_REQUEST,

            ErrorCode::ValidationFailed | ErrorCode::InvalidRange => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::InvalidCredentials => "Incorrect username or password",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidToken => "Could not validate credentials",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::UsernameTaken => "Username already registered",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::NotFound => "Not found",
            ErrorCode::RateLimited => "Rate limit exceeded. Try again later.",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
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
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field errors, retry hints, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
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

    /// Create an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create an InvalidCredentials error with the login failure message.
    pub fn invalid_credentials() -> Self {
        Self::from_code(ErrorCode::InvalidCredentials)
    }

    /// Create a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create an InvalidToken error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    /// Create a TokenExpired error.
    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    /// Create a UsernameTaken error.
    pub fn username_taken() -> Self {
        Self::from_code(ErrorCode::UsernameTaken)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidRange error.
    pub fn invalid_range(field: &str, min: i64, max: i64) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    /// Create a NotFound error for a note that is absent or owned by someone else.
    pub fn note_not_found() -> Self {
        Self::new(ErrorCode::NotFound, "Note not found or access denied")
    }

    /// Create a RateLimited error.
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::from_code(ErrorCode::RateLimited).with_details(serde_json::json!({
            "retry_after_secs": retry_after_secs,
        }))
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
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

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN AND LIBRARY ERRORS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let details = serde_json::json!({ "field": err.field() });
        match err {
            ValidationError::OutOfRange { min, max, .. } => {
                ApiError::invalid_range(err.field(), min, max).with_details(details)
            }
            _ => ApiError::validation_failed(err.to_string()).with_details(details),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate { .. } => ApiError::username_taken(),
            StorageError::NotFound { entity_type, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} {} not found", entity_type, id))
            }
            StorageError::Unavailable { reason } => {
                tracing::error!(%reason, "Storage unavailable");
                ApiError::service_unavailable("Database is unavailable")
            }
            StorageError::QueryFailed { .. } | StorageError::CorruptRow { .. } => {
                // Details were logged where the query ran.
                ApiError::database_error("Database operation failed")
            }
        }
    }
}

impl From<KvError> for ApiError {
    fn from(err: KvError) -> Self {
        tracing::error!("Key-value store error: {}", err);
        ApiError::service_unavailable("Cache store is unavailable")
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

impl From<NotesError> for ApiError {
    fn from(err: NotesError) -> Self {
        match err {
            NotesError::Storage(e) => e.into(),
            NotesError::Kv(e) => e.into(),
            NotesError::Validation(e) => e.into(),
            NotesError::Config(e) => e.into(),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::internal_error(format!("JSON serialization failed: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
