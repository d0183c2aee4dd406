//! Server test utilities.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use restgate_core::AuthClaims;
use restgate_core::config::{AppConfig, StorageConfig};
use restgate_server::{AppState, create_router};
use restgate_signer::TokenSigner;
use restgate_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: Option<TempDir>,
}

/// Status, headers and body of a finished request.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary filesystem storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("repositories");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem { path: storage_path };
        modifier(&mut config);

        Self::build(config, storage, Some(temp_dir))
    }

    /// Create a test server over an arbitrary object store.
    pub fn with_store(storage: Arc<dyn ObjectStore>) -> Self {
        Self::build(AppConfig::for_testing(), storage, None)
    }

    fn build(config: AppConfig, storage: Arc<dyn ObjectStore>, temp_dir: Option<TempDir>) -> Self {
        restgate_server::metrics::register_metrics();
        let state = AppState::new(config, storage).expect("Failed to create app state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Sign a token for `repository` with the server's secret.
    pub fn token(&self, user: &str, repository: &str, write_once: bool) -> String {
        TokenSigner::new(self.state.config.auth.secret.as_bytes())
            .expect("Failed to create signer")
            .sign(&AuthClaims::new(user, repository, write_once))
            .expect("Failed to sign token")
    }

    /// `Authorization` header value carrying a token for `repository`.
    pub fn auth(&self, repository: &str, write_once: bool) -> String {
        basic_auth(&self.token("restic", repository, write_once))
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send an authenticated request with an optional body.
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        auth: &str,
        body: impl Into<Body>,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", auth)
            .body(body.into())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Create a repository with credentials for it.
    pub async fn create_repository(&self, repository: &str) {
        let response = self
            .call(
                "POST",
                &format!("/{repository}?create=true"),
                &self.auth(repository, false),
                Body::empty(),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "create {repository}");
    }

    /// List blobs of one type with the v2 media type.
    pub async fn list(&self, repository: &str, blob_type: &str, auth: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(format!("/{repository}/{blob_type}"))
            .header("Authorization", auth)
            .header("Accept", super::V2)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }
}

/// Basic auth header with an ignored user part.
#[allow(dead_code)]
pub fn basic_auth(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("restic:{token}")))
}
