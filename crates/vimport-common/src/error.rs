//! Error types shared by the importer crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by hashing, timestamp formatting and record validation
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid file record: {0}")]
    InvalidRecord(String),
}
