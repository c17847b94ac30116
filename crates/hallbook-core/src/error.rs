//! Unified error handling for Hallbook
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the booking engine, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Store Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ==================== Booking Errors ====================
    #[error("Venue not found: {0}")]
    VenueNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Slot no longer available, please pick another: {0}")]
    SlotUnavailable(String),

    #[error("Invalid booking state: {0}")]
    InvalidState(String),

    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized(_) | AppError::InvalidToken(_) | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            // 402 Payment Required
            AppError::PaymentVerification(_) => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::VenueNotFound(_) | AppError::BookingNotFound(_) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }

            // 409 Conflict
            AppError::SlotUnavailable(_)
            | AppError::InvalidState(_)
            | AppError::Conflict(_)
            | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 503 Service Unavailable
            AppError::Unavailable(_) | AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Unavailable(_) => "unavailable",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::VenueNotFound(_) => "venue_not_found",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::SlotUnavailable(_) => "slot_unavailable",
            AppError::InvalidState(_) => "invalid_state",
            AppError::PaymentVerification(_) => "payment_verification_failed",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the caller may retry the same request with backoff.
    ///
    /// Only transport/store failures qualify. Conflicts and validation
    /// failures must never be retried with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Unavailable(_) | AppError::Pool(_) | AppError::Transaction(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::SlotUnavailable("12:00-15:00".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::BookingNotFound("123".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PaymentVerification("bad signature".to_string()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::Forbidden("not owner".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Unavailable("lock timeout".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::SlotUnavailable(String::new()).error_code(),
            "slot_unavailable"
        );
        assert_eq!(
            AppError::InvalidState(String::new()).error_code(),
            "invalid_state"
        );
        assert_eq!(AppError::TokenExpired.error_code(), "token_expired");
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::Unavailable("timeout".to_string()).is_retryable());
        assert!(!AppError::SlotUnavailable("taken".to_string()).is_retryable());
        assert!(!AppError::Validation("bad range".to_string()).is_retryable());
    }
}
