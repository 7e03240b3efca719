//! Error types for the shared docimport types

use thiserror::Error;

/// Result type alias for shared type validation
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid content hash '{0}': must be non-empty and contain no path separators")]
    InvalidContentHash(String),

    #[error("Invalid flag value: {0}")]
    InvalidFlag(i64),
}
