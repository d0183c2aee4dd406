//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid repository name: {0}")]
    InvalidRepository(String),

    #[error("invalid blob type: {0}")]
    InvalidBlobType(String),

    #[error("invalid blob name: {0}")]
    InvalidBlobName(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
