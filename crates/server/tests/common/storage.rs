//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use restgate_storage::{
    FilesystemBackend, ListEntry, ObjectDownload, ObjectMeta, ObjectStore, PutMode,
    StorageResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A test storage wrapper that cleans up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<dyn ObjectStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    /// Create a new test storage with a temporary directory.
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        })
    }

    /// Get a reference to the object store.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.backend.clone()
    }
}

/// Object store wrapper that counts every backend call.
#[allow(dead_code)]
pub struct CountingStore {
    inner: Arc<dyn ObjectStore>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of backend calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.hit();
        self.inner.bucket_exists(bucket).await
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.hit();
        self.inner.create_bucket(bucket).await
    }

    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        self.hit();
        self.inner.head(bucket, key).await
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> StorageResult<ObjectDownload> {
        self.hit();
        self.inner.get(bucket, key, range).await
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes, mode: PutMode) -> StorageResult<()> {
        self.hit();
        self.inner.put(bucket, key, data, mode).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.hit();
        self.inner.delete(bucket, key).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ListEntry>> {
        self.hit();
        self.inner.list(bucket, prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// Object store whose listing returns canned entries.
#[allow(dead_code)]
pub struct CannedListStore {
    pub entries: Vec<ListEntry>,
}

#[async_trait]
impl ObjectStore for CannedListStore {
    async fn bucket_exists(&self, _bucket: &str) -> StorageResult<bool> {
        Ok(true)
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        Err(restgate_storage::StorageError::BucketAlreadyExists(
            bucket.to_string(),
        ))
    }

    async fn head(&self, _bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        Err(restgate_storage::StorageError::NotFound(key.to_string()))
    }

    async fn get(
        &self,
        _bucket: &str,
        key: &str,
        _range: Option<&str>,
    ) -> StorageResult<ObjectDownload> {
        Err(restgate_storage::StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, _bucket: &str, _key: &str, _data: Bytes, _mode: PutMode) -> StorageResult<()> {
        Err(restgate_storage::StorageError::Io(std::io::Error::other(
            "read-only test store",
        )))
    }

    async fn delete(&self, _bucket: &str, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn list(&self, _bucket: &str, _prefix: &str) -> StorageResult<Vec<ListEntry>> {
        Ok(self.entries.clone())
    }

    fn backend_name(&self) -> &'static str {
        "canned"
    }
}
