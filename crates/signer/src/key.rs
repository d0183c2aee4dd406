//! HMAC-SHA256 signing key.

use crate::error::{SignerError, SignerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

/// Keyed HMAC state shared by signing and verification.
///
/// The keyed state is computed once and cloned per operation.
#[derive(Clone)]
pub struct SigningKey(Hmac<Sha256>);

impl SigningKey {
    /// Create a key from a shared secret.
    pub fn new(secret: &[u8]) -> SignerResult<Self> {
        if secret.is_empty() {
            return Err(SignerError::KeyParsing("secret must not be empty".to_string()));
        }
        Hmac::<Sha256>::new_from_slice(secret)
            .map(Self)
            .map_err(|e| SignerError::KeyParsing(e.to_string()))
    }

    /// Compute the MAC of `message`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.0.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    /// Check `signature` against `message` in constant time.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> SignerResult<()> {
        let mut mac = self.0.clone();
        mac.update(message);
        mac.verify_slice(signature)
            .map_err(|_| SignerError::VerificationFailed)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}
