//! Error types for RagBridge
//!
//! Provides the application-wide error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    DocumentRejected,

    // Resource errors (4xxx)
    StoreNotFound,
    DirectoryNotFound,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTimeout,
    Cancelled,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::DocumentRejected => 1002,

            // Resources (4xxx)
            ErrorCode::StoreNotFound => 4001,
            ErrorCode::DirectoryNotFound => 4002,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTimeout => 8002,
            ErrorCode::Cancelled => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Document rejected: {reason}")]
    DocumentRejected { reason: String },

    // Resource errors
    #[error("Store not found: {name}")]
    StoreNotFound { name: String },

    #[error("Directory not found or not a directory: {path}")]
    DirectoryNotFound { path: String },

    // External service errors
    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Provider operation timed out after {timeout_secs}s")]
    ProviderTimeout { timeout_secs: u64 },

    #[error("Operation cancelled by caller")]
    OperationCancelled,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::DocumentRejected { .. } => ErrorCode::DocumentRejected,
            AppError::StoreNotFound { .. } => ErrorCode::StoreNotFound,
            AppError::DirectoryNotFound { .. } => ErrorCode::DirectoryNotFound,
            AppError::Provider { .. } => ErrorCode::UpstreamError,
            AppError::ProviderTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::OperationCancelled => ErrorCode::Cancelled,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::DocumentRejected { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            AppError::StoreNotFound { .. } | AppError::DirectoryNotFound { .. } => {
                StatusCode::NOT_FOUND
            }

            // 500 Internal Server Error
            // Provider failures that reach the HTTP boundary surface as
            // 500 with a detail string
            AppError::Provider { .. }
            | AppError::HttpClient(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::OperationCancelled => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let detail = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %detail,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %detail,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(ErrorResponse { detail, code })).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::StoreNotFound {
            name: "contracts".into(),
        };
        assert_eq!(err.code(), ErrorCode::StoreNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rejected_document_is_client_error() {
        let err = AppError::DocumentRejected {
            reason: "unsupported file format: .exe".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_provider_error_is_server_error() {
        let err = AppError::Provider {
            message: "quota exceeded".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = AppError::ProviderTimeout { timeout_secs: 600 };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code().as_code(), 8002);
    }
}
