//! Core domain types for the restgate restic REST gateway.
//!
//! - Repository names and the blob key scheme
//! - Access token claims
//! - Application configuration

pub mod blob;
pub mod config;
pub mod error;
pub mod token;

pub use blob::{BlobKey, BlobName, BlobType, ObjectKind, RepositoryName};
pub use error::{Error, Result};
pub use token::AuthClaims;

/// Default request body limit: 100 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Minimum length of the token signing secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;
