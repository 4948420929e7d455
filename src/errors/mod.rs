//! Error handling module for the outreach backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const ALREADY_PAIRED: &str = "ALREADY_PAIRED";
    pub const DUPLICATE_REQUEST: &str = "DUPLICATE_REQUEST";
    pub const STALE_REQUEST: &str = "STALE_REQUEST";
    pub const NOT_PAIRED: &str = "NOT_PAIRED";
    pub const INVALID_SELECTION: &str = "INVALID_SELECTION";
    pub const PAIR_UNAVAILABLE: &str = "PAIR_UNAVAILABLE";
    pub const PAIR_CREATION_FAILED: &str = "PAIR_CREATION_FAILED";
    pub const STORAGE_FAILURE: &str = "STORAGE_FAILURE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// No valid session was presented
    Unauthenticated(String),
    /// Acting user may not perform the operation
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Uniqueness violation (username, register number)
    Conflict(String),
    /// One of the parties already has a partner
    AlreadyPaired(String),
    /// An identical pending request exists
    DuplicateRequest(String),
    /// The request was overtaken by another pairing and has been purged
    StaleRequest(String),
    /// The user has no partner
    NotPaired(String),
    /// The same pair was selected twice
    InvalidSelection(String),
    /// Pair missing or already attached to a team
    PairUnavailable(String),
    /// The pair transaction could not be committed
    PairCreationFailed(String),
    /// Material file could not be stored or read
    StorageFailure(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AlreadyPaired(_) => StatusCode::CONFLICT,
            AppError::DuplicateRequest(_) => StatusCode::CONFLICT,
            AppError::StaleRequest(_) => StatusCode::CONFLICT,
            AppError::NotPaired(_) => StatusCode::CONFLICT,
            AppError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            AppError::PairUnavailable(_) => StatusCode::CONFLICT,
            AppError::PairCreationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::AlreadyPaired(_) => codes::ALREADY_PAIRED,
            AppError::DuplicateRequest(_) => codes::DUPLICATE_REQUEST,
            AppError::StaleRequest(_) => codes::STALE_REQUEST,
            AppError::NotPaired(_) => codes::NOT_PAIRED,
            AppError::InvalidSelection(_) => codes::INVALID_SELECTION,
            AppError::PairUnavailable(_) => codes::PAIR_UNAVAILABLE,
            AppError::PairCreationFailed(_) => codes::PAIR_CREATION_FAILED,
            AppError::StorageFailure(_) => codes::STORAGE_FAILURE,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthenticated(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::AlreadyPaired(msg)
            | AppError::DuplicateRequest(msg)
            | AppError::StaleRequest(msg)
            | AppError::NotPaired(msg)
            | AppError::InvalidSelection(msg)
            | AppError::PairUnavailable(msg)
            | AppError::PairCreationFailed(msg)
            | AppError::StorageFailure(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
