//! Access token signing and verification for restgate.
//!
//! Tokens are compact JSON Web Tokens signed with HMAC-SHA256:
//! - Shared-secret key management
//! - Token signing with optional expiry
//! - Signature, algorithm, and time-window verification

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::SigningKey;
pub use signer::{TokenSigner, TokenVerifier};
