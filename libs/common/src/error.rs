//! Custom error types for the common library
//!
//! This module defines the error taxonomy shared by every layer of the
//! client. Request failures are always one of the `ApiError` variants, so
//! callers can match on the category instead of parsing strings.

use std::collections::HashMap;
use thiserror::Error;

/// Category of a failed API operation
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection-level failure, including timeouts
    #[error("Network failure: {0}")]
    Network(String),

    /// Authentication failed or the session is gone
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed to access the resource
    #[error("Access denied")]
    Forbidden,

    /// The resource does not exist
    #[error("Resource not found")]
    NotFound,

    /// The backend reported a 5xx failure
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Invalid input, locally or as reported by the backend
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// Per-field messages, keyed by field name
        field_errors: HashMap<String, Vec<String>>,
    },
}

/// Type alias for Result with ApiError
pub type ApiResult<T> = Result<T, ApiError>;

/// Custom error type for local persistence operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error occurred reading or writing the backing file
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with StorageError
pub type StorageResult<T> = Result<T, StorageError>;

/// Custom error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error occurred assembling or deserializing the configuration
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// A configuration value failed validation
    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}
