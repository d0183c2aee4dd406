//! HTTP gateway implementing the restic REST backend protocol.
//!
//! This crate provides:
//! - Token authentication carried in HTTP Basic auth
//! - Repository and blob operations over an object store
//! - Write-once (WORM) enforcement through conditional writes
//! - Byte-range downloads and the v2 listing format

pub mod auth;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod routes;
pub mod state;

pub use auth::{AuthEngine, Authenticated, TraceId};
pub use error::ApiError;
pub use gateway::RepositoryGateway;
pub use routes::create_router;
pub use state::AppState;
