//! HS256 token signing and verification.

use crate::error::{SignerError, SignerResult};
use crate::key::SigningKey;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

/// The only accepted `alg` header value.
pub const ALGORITHM: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Trait for verifying access tokens.
///
/// Returns the verified payload; checking it against a claims schema is the
/// caller's job.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> SignerResult<Value>;
}

/// Signs and verifies compact HS256 JSON Web Tokens with a shared secret.
#[derive(Clone, Debug)]
pub struct TokenSigner {
    key: SigningKey,
    leeway_secs: i64,
}

impl TokenSigner {
    /// Create a signer from a shared secret.
    pub fn new(secret: &[u8]) -> SignerResult<Self> {
        Ok(Self {
            key: SigningKey::new(secret)?,
            leeway_secs: 0,
        })
    }

    /// Tolerate `leeway_secs` of clock skew on `exp` and `nbf`.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
        self
    }

    /// Sign a claim set. `claims` must serialize to a JSON object.
    pub fn sign<T: Serialize>(&self, claims: &T) -> SignerResult<String> {
        let payload = claims_object(claims)?;
        self.sign_object(&payload)
    }

    /// Sign a claim set, adding `iat` and an `exp` of now + `ttl`.
    pub fn sign_with_expiry<T: Serialize>(&self, claims: &T, ttl: Duration) -> SignerResult<String> {
        let mut payload = claims_object(claims)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        payload.insert("iat".to_string(), Value::from(now));
        payload.insert(
            "exp".to_string(),
            Value::from(now.saturating_add(ttl.whole_seconds())),
        );
        self.sign_object(&payload)
    }

    fn sign_object(&self, payload: &Map<String, Value>) -> SignerResult<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.key.sign(signing_input.as_bytes()));
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token against the given unix time.
    pub fn verify_at(&self, token: &str, now: i64) -> SignerResult<Value> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SignerError::Malformed(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
            .map_err(|e| SignerError::Malformed(format!("invalid header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(SignerError::UnsupportedAlgorithm(header.alg));
        }

        let signature = decode_segment(signature_b64, "signature")?;
        let signing_input_len = header_b64.len() + 1 + payload_b64.len();
        self.key
            .verify(token[..signing_input_len].as_bytes(), &signature)?;

        let payload: Value = serde_json::from_slice(&decode_segment(payload_b64, "payload")?)
            .map_err(|e| SignerError::Malformed(format!("invalid payload: {e}")))?;
        let Some(object) = payload.as_object() else {
            return Err(SignerError::Malformed(
                "payload is not a JSON object".to_string(),
            ));
        };

        if let Some(exp) = numeric_claim(object, "exp")?
            && exp < now.saturating_sub(self.leeway_secs)
        {
            return Err(SignerError::Expired);
        }
        if let Some(nbf) = numeric_claim(object, "nbf")?
            && nbf > now.saturating_add(self.leeway_secs)
        {
            return Err(SignerError::NotYetValid);
        }

        Ok(payload)
    }
}

impl TokenVerifier for TokenSigner {
    fn verify(&self, token: &str) -> SignerResult<Value> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }
}

fn claims_object<T: Serialize>(claims: &T) -> SignerResult<Map<String, Value>> {
    match serde_json::to_value(claims)? {
        Value::Object(map) => Ok(map),
        _ => Err(SignerError::Malformed(
            "claims must serialize to a JSON object".to_string(),
        )),
    }
}

fn decode_segment(segment: &str, what: &str) -> SignerResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| SignerError::Malformed(format!("invalid {what} encoding: {e}")))
}

/// Read a registered time claim; absent is fine, a non-number is not.
fn numeric_claim(object: &Map<String, Value>, name: &str) -> SignerResult<Option<i64>> {
    match object.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| SignerError::Malformed(format!("{name} must be a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restgate_core::AuthClaims;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET).unwrap()
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let claims = AuthClaims::new("alice", "backups", true);
        let token = signer().sign(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let payload = signer().verify(&token).unwrap();
        let decoded: AuthClaims = serde_json::from_value(payload).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_header_declares_hs256() {
        let token = signer().sign(&AuthClaims::new("a", "r", false)).unwrap();
        let header_b64 = token.split('.').next().unwrap();
        let header: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = signer().sign(&AuthClaims::new("a", "r", false)).unwrap();
        let other = TokenSigner::new(b"another-secret-another-secret-00").unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(SignerError::VerificationFailed)
        ));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let token = signer().sign(&AuthClaims::new("a", "r1", false)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"user":"a","repository":"r2","writeOnce":false}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(matches!(
            signer().verify(&tampered),
            Err(SignerError::VerificationFailed)
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"user":"a","repository":"r","writeOnce":false}"#);
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            signer().verify(&token),
            Err(SignerError::UnsupportedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(signer().verify(token), Err(SignerError::Malformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_expiry_enforced() {
        let token = signer()
            .sign_with_expiry(&AuthClaims::new("a", "r", false), Duration::minutes(5))
            .unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp();

        assert!(signer().verify_at(&token, now).is_ok());
        assert!(matches!(
            signer().verify_at(&token, now + 3600),
            Err(SignerError::Expired)
        ));
        assert!(
            signer()
                .with_leeway(7200)
                .verify_at(&token, now + 3600)
                .is_ok()
        );
    }

    #[test]
    fn test_not_before_enforced() {
        let mut claims = serde_json::to_value(AuthClaims::new("a", "r", false)).unwrap();
        claims["nbf"] = Value::from(1_000);
        let token = signer().sign(&claims).unwrap();

        assert!(matches!(
            signer().verify_at(&token, 500),
            Err(SignerError::NotYetValid)
        ));
        assert!(signer().verify_at(&token, 1_000).is_ok());
    }

    #[test]
    fn test_non_numeric_exp_is_malformed() {
        let mut claims = serde_json::to_value(AuthClaims::new("a", "r", false)).unwrap();
        claims["exp"] = Value::from("tomorrow");
        let token = signer().sign(&claims).unwrap();
        assert!(matches!(
            signer().verify(&token),
            Err(SignerError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_claims_rejected() {
        assert!(signer().sign(&"just a string").is_err());
    }
}
