//! Repository gateway: restic repository operations over an object store.
//!
//! Each repository is one bucket. The config object lives at `config` and
//! blobs at `<type>/<name>`. Backend failures are logged in full and reach the
//! client only as [`STORAGE_ERROR_MESSAGE`].

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use bytes::Bytes;
use restgate_core::{BlobKey, BlobType, RepositoryName};
use restgate_storage::{ObjectDownload, ObjectStore, PutMode, StorageError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Client-facing message for every backend failure.
pub const STORAGE_ERROR_MESSAGE: &str = "an error occurred with the storage server";

/// One entry of a blob listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlobEntry {
    pub name: String,
    pub size: u64,
}

/// A download ready to be streamed to the client.
#[derive(Debug)]
pub struct Download {
    pub object: ObjectDownload,
    /// A range was requested and the backend answered with one.
    pub partial: bool,
}

/// Repository and blob operations on top of an [`ObjectStore`].
#[derive(Clone)]
pub struct RepositoryGateway {
    store: Arc<dyn ObjectStore>,
}

impl RepositoryGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// The underlying storage backend.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Create the bucket backing `repository`.
    ///
    /// `create` must be true; otherwise the request is rejected without
    /// touching the backend.
    pub async fn create_repository(&self, repository: &RepositoryName, create: bool) -> ApiResult<()> {
        if !create {
            return Err(ApiError::BadRequest(
                "repository creation requires create=true".to_string(),
            ));
        }

        let exists = self
            .store
            .bucket_exists(repository.as_str())
            .await
            .map_err(|e| storage_failure("create_repository", repository, e))?;
        if exists {
            return Err(repository_exists(repository));
        }

        match self.store.create_bucket(repository.as_str()).await {
            Ok(()) => {
                metrics::REPOSITORIES_CREATED.inc();
                tracing::info!(repository = %repository, "repository created");
                Ok(())
            }
            Err(StorageError::BucketAlreadyExists(_)) => Err(repository_exists(repository)),
            Err(e) => Err(storage_failure("create_repository", repository, e)),
        }
    }

    /// Repository deletion is not supported.
    ///
    /// The name is taken raw: the answer is the same whether or not it is a
    /// valid repository name.
    pub async fn delete_repository(&self, repository: &str) -> ApiResult<()> {
        tracing::debug!(repository, "repository deletion requested");
        Err(ApiError::NotImplemented(
            "repository deletion is not supported".to_string(),
        ))
    }

    pub async fn check_config(&self, repository: &RepositoryName) -> ApiResult<u64> {
        self.check(&BlobKey::config(repository.clone())).await
    }

    pub async fn get_config(
        &self,
        repository: &RepositoryName,
        range: Option<&str>,
    ) -> ApiResult<Download> {
        self.get(&BlobKey::config(repository.clone()), range).await
    }

    pub async fn save_config(
        &self,
        repository: &RepositoryName,
        body: Bytes,
        write_once: bool,
    ) -> ApiResult<()> {
        self.save(&BlobKey::config(repository.clone()), body, write_once)
            .await
    }

    pub async fn check_blob(&self, key: &BlobKey) -> ApiResult<u64> {
        self.check(key).await
    }

    pub async fn get_blob(&self, key: &BlobKey, range: Option<&str>) -> ApiResult<Download> {
        self.get(key, range).await
    }

    pub async fn save_blob(&self, key: &BlobKey, body: Bytes, write_once: bool) -> ApiResult<()> {
        self.save(key, body, write_once).await
    }

    /// List the blobs of one type, names stripped of their `<type>/` prefix.
    pub async fn list_blobs(
        &self,
        repository: &RepositoryName,
        blob_type: BlobType,
    ) -> ApiResult<Vec<BlobEntry>> {
        let prefix = blob_type.list_prefix();
        let entries = self
            .store
            .list(repository.as_str(), &prefix)
            .await
            .map_err(|e| storage_failure("list", &format_args!("{repository}/{prefix}"), e))?;

        let blobs = entries
            .into_iter()
            .map(|entry| {
                let (Some(key), Some(size)) = (entry.key, entry.size) else {
                    return Err(invalid_listing(repository, "entry without key or size"));
                };
                let Some(name) = blob_type.strip_prefix(&key) else {
                    return Err(invalid_listing(
                        repository,
                        &format!("key {key:?} outside prefix {prefix:?}"),
                    ));
                };
                Ok(BlobEntry {
                    name: name.to_string(),
                    size,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;

        metrics::record_blob_operation("list", blob_type.as_str());
        tracing::debug!(repository = %repository, blob_type = %blob_type, count = blobs.len(), "listed blobs");
        Ok(blobs)
    }

    /// Delete a blob.
    ///
    /// Write-once credentials may only delete locks.
    pub async fn delete_blob(&self, key: &BlobKey, write_once: bool) -> ApiResult<()> {
        let is_lock = key.blob_type().is_some_and(BlobType::is_lock);
        if write_once && !is_lock {
            metrics::record_worm_rejection("delete");
            tracing::info!(key = %key, "delete rejected for write-once credentials");
            return Err(ApiError::MethodNotAllowed(format!(
                "write-once credentials cannot delete {}",
                key.type_label()
            )));
        }

        self.store
            .delete(key.bucket(), &key.object_key())
            .await
            .map_err(|e| storage_failure("delete", key, e))?;

        metrics::record_blob_operation("delete", key.type_label());
        tracing::debug!(key = %key, "deleted");
        Ok(())
    }

    /// Object size; every failure reads as "not found".
    async fn check(&self, key: &BlobKey) -> ApiResult<u64> {
        match self.store.head(key.bucket(), &key.object_key()).await {
            Ok(meta) => {
                tracing::debug!(key = %key, size = meta.size, "checked");
                Ok(meta.size)
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "check failed");
                Err(ApiError::NotFound(key.to_string()))
            }
        }
    }

    async fn get(&self, key: &BlobKey, range: Option<&str>) -> ApiResult<Download> {
        let object = match self.store.get(key.bucket(), &key.object_key(), range).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %key, "not found");
                return Err(ApiError::NotFound(key.to_string()));
            }
            Err(e) => return Err(storage_failure("get", key, e)),
        };

        let partial = range.is_some() && object.is_partial();
        metrics::record_blob_operation("get", key.type_label());
        tracing::debug!(key = %key, range, partial, "serving object");
        Ok(Download { object, partial })
    }

    async fn save(&self, key: &BlobKey, body: Bytes, write_once: bool) -> ApiResult<()> {
        let mode = if write_once {
            PutMode::IfAbsent
        } else {
            PutMode::Overwrite
        };
        let len = body.len();

        match self
            .store
            .put(key.bucket(), &key.object_key(), body, mode)
            .await
        {
            Ok(()) => {
                metrics::record_blob_operation("save", key.type_label());
                metrics::record_bytes_written(len);
                tracing::debug!(key = %key, size = len, write_once, "saved");
                Ok(())
            }
            Err(StorageError::PreconditionFailed(_)) => {
                metrics::record_worm_rejection("overwrite");
                tracing::info!(key = %key, "overwrite rejected for write-once credentials");
                let what = if key.is_config() { "config" } else { "blob" };
                Err(ApiError::Conflict(format!("{what} already exists")))
            }
            Err(e) => Err(storage_failure("save", key, e)),
        }
    }
}

impl fmt::Debug for RepositoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryGateway")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

fn repository_exists(repository: &RepositoryName) -> ApiError {
    ApiError::Conflict(format!("repository already exists: {repository}"))
}

/// Log a backend failure in full and collapse it into the opaque client error.
fn storage_failure(operation: &'static str, target: &dyn fmt::Display, err: StorageError) -> ApiError {
    metrics::record_storage_error(operation);
    tracing::error!(operation, object = %target, error = %err, "storage backend failure");
    ApiError::Internal(STORAGE_ERROR_MESSAGE.to_string())
}

fn invalid_listing(repository: &RepositoryName, detail: &str) -> ApiError {
    metrics::record_storage_error("list");
    tracing::error!(repository = %repository, detail, "backend returned an invalid listing");
    ApiError::Internal(STORAGE_ERROR_MESSAGE.to_string())
}
