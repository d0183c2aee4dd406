//! Authentication and authorization middleware.
//!
//! Credentials arrive as HTTP Basic auth whose password is a signed access
//! token; the user part is ignored. The token's claims name the one
//! repository the caller may touch and whether the credential is write-once.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use restgate_core::AuthClaims;
use restgate_core::config::AuthConfig;
use restgate_signer::error::SignerResult;
use restgate_signer::{TokenSigner, TokenVerifier};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Path parameter holding the repository name on every repository route.
pub const REPOSITORY_PARAM: &str = "repo";

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    ///
    /// Keeps at most `MAX_TRACE_ID_LEN` characters and drops anything that
    /// isn't printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a credential was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    NotBasic,
    MalformedCredentials,
    MissingToken,
    InvalidToken,
    InvalidPayload,
    RepositoryMismatch,
}

impl AuthRejection {
    /// Metric label for this rejection.
    pub fn reason(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::NotBasic => "not_basic",
            Self::MalformedCredentials => "malformed_credentials",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::InvalidPayload => "invalid_payload",
            Self::RepositoryMismatch => "repository_mismatch",
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        match rejection {
            AuthRejection::MissingHeader => {
                ApiError::Unauthorized("missing Authorization header".to_string())
            }
            AuthRejection::NotBasic | AuthRejection::MalformedCredentials => {
                ApiError::Unauthorized("expected Basic auth".to_string())
            }
            AuthRejection::MissingToken => {
                ApiError::Unauthorized("expected Basic auth token".to_string())
            }
            AuthRejection::InvalidToken => ApiError::Unauthorized("invalid token".to_string()),
            AuthRejection::InvalidPayload => {
                ApiError::BadRequest("invalid auth payload".to_string())
            }
            AuthRejection::RepositoryMismatch => {
                ApiError::BadRequest("repository mismatch".to_string())
            }
        }
    }
}

/// Extract the token from a Basic `Authorization` header.
///
/// The scheme is case-insensitive. The decoded credential is
/// `<ignored>:<token>`; everything after the first colon is the token.
pub fn extract_basic_token(headers: &HeaderMap) -> Result<String, AuthRejection> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::NotBasic)?;

    let encoded = match value.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("basic ") => value[6..].trim(),
        _ => return Err(AuthRejection::NotBasic),
    };

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| AuthRejection::MalformedCredentials)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AuthRejection::MalformedCredentials)?;

    match credentials.split_once(':') {
        Some((_, token)) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AuthRejection::MissingToken),
    }
}

/// Decides whether a request carries valid credentials for a repository.
///
/// Holds only immutable verifier state; one engine is shared by every request.
#[derive(Clone)]
pub struct AuthEngine {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthEngine {
    pub fn new(verifier: impl TokenVerifier + 'static) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }

    /// Build an engine that verifies HS256 tokens with the configured secret.
    pub fn from_config(config: &AuthConfig) -> SignerResult<Self> {
        let signer = TokenSigner::new(config.secret.as_bytes())?.with_leeway(config.leeway_secs);
        Ok(Self::new(signer))
    }

    /// Verify the request's credentials and decode the claims.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthClaims, AuthRejection> {
        let token = extract_basic_token(headers)?;

        let payload = self.verifier.verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "token verification failed");
            AuthRejection::InvalidToken
        })?;

        serde_json::from_value(payload).map_err(|e| {
            tracing::debug!(error = %e, "token payload does not match the claims schema");
            AuthRejection::InvalidPayload
        })
    }

    /// Check the claims against the repository named in the request path.
    pub fn authorize(
        &self,
        claims: &AuthClaims,
        repository: Option<&str>,
    ) -> Result<(), AuthRejection> {
        match repository {
            Some(repository) if !claims.allows_repository(repository) => {
                Err(AuthRejection::RepositoryMismatch)
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for AuthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEngine").finish_non_exhaustive()
    }
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Assign a trace ID and run the request inside a `request` span.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        user = tracing::field::Empty
    );
    req.extensions_mut().insert(trace_id);

    next.run(req).instrument(span).await
}

/// Authentication middleware for routes that require credentials.
///
/// Rejects the request before the handler runs, so a rejected request never
/// reaches the storage backend. On success the claims are inserted as a
/// request extension for the [`Authenticated`] extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let repository = params.ok().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == REPOSITORY_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let claims = state
        .auth
        .authenticate(req.headers())
        .and_then(|claims| {
            state
                .auth
                .authorize(&claims, repository.as_deref())
                .map(|()| claims)
        })
        .map_err(|rejection| {
            metrics::record_auth_failure(rejection.reason());
            tracing::info!(
                reason = rejection.reason(),
                repository = repository.as_deref().unwrap_or(""),
                "request rejected"
            );
            ApiError::from(rejection)
        })?;

    tracing::Span::current().record("user", claims.user.as_str());
    metrics::record_authenticated(&claims.user);

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Verified claims of the current request.
#[derive(Clone, Debug)]
pub struct Authenticated(pub AuthClaims);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> ApiResult<Self> {
        parts
            .extensions
            .get::<AuthClaims>()
            .cloned()
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}
