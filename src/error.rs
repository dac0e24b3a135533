//! Error types for the sqlsage learning engine
//!
//! This module provides structured error definitions using thiserror, with
//! anyhow reserved for error propagation at the binary boundary.

use thiserror::Error;

/// Main error type for sqlsage operations
#[derive(Error, Debug)]
pub enum SqlSageError {
    /// Malformed feedback input, rejected synchronously before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable write failed after exhausting retries
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Snapshot or sidecar state is unreadable or inconsistent
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Embedding model is down or timed out; callers degrade to keyword-only
    #[error("Embedding dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Embedding generation produced unusable output
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Invalid record ID format
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(#[from] uuid::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for sqlsage operations
pub type Result<T> = std::result::Result<T, SqlSageError>;

/// Convert anyhow::Error to SqlSageError
impl From<anyhow::Error> for SqlSageError {
    fn from(err: anyhow::Error) -> Self {
        SqlSageError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlSageError::Validation("user_rating must be between 1 and 5".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: user_rating must be between 1 and 5"
        );
    }

    #[test]
    fn test_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("not-a-uuid");
        assert!(uuid_err.is_err());

        let sage_err: SqlSageError = uuid_err.unwrap_err().into();
        assert!(matches!(sage_err, SqlSageError::InvalidRecordId(_)));
    }
}
