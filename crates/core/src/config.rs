//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Expose `/-/metrics` for Prometheus scraping.
    /// SECURITY: restrict this endpoint at the network level when enabled.
    #[serde(default)]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_body_size() -> usize {
    crate::DEFAULT_MAX_BODY_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_size: default_max_body_size(),
            metrics_enabled: false,
        }
    }
}

/// Access token verification settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret used to sign and verify access tokens.
    pub secret: String,
    /// Clock skew tolerated when checking `exp` and `nbf`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

impl AuthConfig {
    /// Create a test configuration with a fixed secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            secret: "restgate-test-secret-0123456789abcdef".to_string(),
            leeway_secs: 0,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.secret.len() < crate::MIN_SECRET_LEN {
            return Err(crate::Error::Config(format!(
                "auth.secret must be at least {} bytes",
                crate::MIN_SECRET_LEN
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

/// Storage backend configuration.
///
/// Each repository is stored in its own bucket (a directory for the
/// filesystem backend), so no bucket is configured here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory; one subdirectory per repository.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Falls back to the ambient AWS credential chain when unset.
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        /// Use path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/repositories"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Token verification (required).
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Create a test configuration with filesystem storage.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::for_testing(),
            storage: StorageConfig::default(),
        }
    }

    /// Validate the whole configuration before anything is built from it.
    pub fn validate(&self) -> crate::Result<()> {
        self.auth.validate()?;
        self.storage.validate().map_err(crate::Error::Config)?;
        if self.server.max_body_size == 0 {
            return Err(crate::Error::Config(
                "server.max_body_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
