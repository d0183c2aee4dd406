//! Application state shared across handlers.

use crate::auth::AuthEngine;
use crate::gateway::RepositoryGateway;
use restgate_core::config::AppConfig;
use restgate_signer::SignerResult;
use restgate_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Repository operations over the storage backend.
    pub gateway: RepositoryGateway,
    /// Credential verification.
    pub auth: Arc<AuthEngine>,
}

impl AppState {
    /// Create the application state from a validated configuration.
    ///
    /// Fails only if the configured secret can't be used as a signing key.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> SignerResult<Self> {
        let auth = AuthEngine::from_config(&config.auth)?;
        tracing::debug!(backend = storage.backend_name(), "application state ready");

        Ok(Self {
            config: Arc::new(config),
            gateway: RepositoryGateway::new(storage),
            auth: Arc::new(auth),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restgate_core::config::AuthConfig;
    use restgate_storage::FilesystemBackend;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_from_test_config() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());

        let state = AppState::new(AppConfig::for_testing(), storage).unwrap();
        assert_eq!(state.gateway.store().backend_name(), "filesystem");
        assert!(!state.config.server.metrics_enabled);
    }

    #[tokio::test]
    async fn test_state_rejects_empty_secret() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());

        let mut config = AppConfig::for_testing();
        config.auth = AuthConfig {
            secret: String::new(),
            leeway_secs: 0,
        };
        assert!(AppState::new(config, storage).is_err());
    }
}
