//! Unified error handling for svcbill
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the application, with automatic HTTP response mapping.

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

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    // ==================== Business Logic Errors ====================
    #[error("Company service not found: {0}")]
    CompanyServiceNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
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
            AppError::InvalidToken(_) | AppError::TokenExpired => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::CompanyServiceNotFound(_) | AppError::InvoiceNotFound(_) => {
                StatusCode::NOT_FOUND
            }

            // 409 Conflict
            AppError::AlreadyExists(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable
            AppError::StoreUnavailable(_) | AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Forbidden => "forbidden",
            AppError::CompanyServiceNotFound(_) => "not_found",
            AppError::InvoiceNotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::PolicyViolation(_) => "policy_violation",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the failure came from the backing store and may succeed later.
    ///
    /// The sweep scheduler backs off and retries on these; everything else is
    /// reported as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Pool(_)
                | AppError::StoreUnavailable(_)
        )
    }

    /// Whether this error means the referenced record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::CompanyServiceNotFound(_) | AppError::InvoiceNotFound(_)
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
            AppError::InvalidState("already suspended".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::CompanyServiceNotFound("cs-1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::StoreUnavailable("timeout".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::PolicyViolation("manual suspension".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::InvoiceNotFound("inv-1".to_string()).error_code(),
            "not_found"
        );
        assert_eq!(
            AppError::StoreUnavailable("down".to_string()).error_code(),
            "store_unavailable"
        );
        assert_eq!(
            AppError::PolicyViolation("x".to_string()).error_code(),
            "policy_violation"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::StoreUnavailable("timeout".to_string()).is_retryable());
        assert!(AppError::Database("connection reset".to_string()).is_retryable());
        assert!(!AppError::InvalidState("cancelled".to_string()).is_retryable());
        assert!(!AppError::PolicyViolation("manual".to_string()).is_retryable());
    }
}
