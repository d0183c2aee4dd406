//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// How `put` treats an existing object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutMode {
    /// Replace any existing object.
    Overwrite,
    /// Atomically fail with `PreconditionFailed` if the key exists.
    IfAbsent,
}

/// Object store abstraction over buckets of named objects.
///
/// Every repository is one bucket. Keys inside a bucket use `/` as a
/// separator.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check whether a bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Create a bucket. Fails with `BucketAlreadyExists` if it exists.
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Get an object's size without fetching content.
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object as a byte stream.
    ///
    /// `range` is an HTTP `Range` header value, passed through untouched.
    /// A backend that can't honour it returns the whole object.
    async fn get(&self, bucket: &str, key: &str, range: Option<&str>)
    -> StorageResult<ObjectDownload>;

    /// Put an object.
    async fn put(&self, bucket: &str, key: &str, data: Bytes, mode: PutMode) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// List every object whose key starts with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ListEntry>>;

    /// Get the name of this storage backend, for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity at startup.
    ///
    /// The default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
}

/// One entry of a prefix listing.
///
/// Fields are optional because S3-compatible services may omit them; callers
/// decide whether a missing field is an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub key: Option<String>,
    pub size: Option<u64>,
}

impl ListEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: Some(key.into()),
            size: Some(size),
        }
    }
}

/// A streaming object read.
pub struct ObjectDownload {
    pub body: ByteStream,
    /// Length of `body` in bytes, when known.
    pub content_length: Option<u64>,
    /// `Content-Range` value when the backend served a partial object.
    pub content_range: Option<String>,
}

impl ObjectDownload {
    /// Whether the backend answered with a byte range rather than the whole object.
    pub fn is_partial(&self) -> bool {
        self.content_range.is_some()
    }
}

impl std::fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}
