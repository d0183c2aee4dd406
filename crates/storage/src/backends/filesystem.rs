//! Local filesystem storage backend.
//!
//! Each bucket is a directory directly under the root. Writes are staged in
//! `<root>/.staging` and published with a rename, or with a hard link when the
//! write must not replace an existing object.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ListEntry, ObjectDownload, ObjectMeta, ObjectStore, PutMode};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Directory for in-flight writes. The leading dot keeps it out of the
/// bucket namespace.
const STAGING_DIR: &str = ".staging";

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root })
    }

    fn validate_bucket(bucket: &str) -> StorageResult<()> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !bucket.starts_with('.') => Ok(()),
            _ => Err(StorageError::InvalidKey(format!(
                "invalid bucket name: {bucket:?}"
            ))),
        }
    }

    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        Self::validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    /// Resolve the bucket directory, failing if it does not exist.
    async fn existing_bucket(&self, bucket: &str) -> StorageResult<PathBuf> {
        let path = self.bucket_path(bucket)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(StorageError::BucketNotFound(bucket.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::BucketNotFound(bucket.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Runs the checks on the blocking pool since they call `canonicalize`
    /// and `symlink_metadata`.
    async fn key_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        Self::validate_bucket(bucket)?;
        let root = self.root.clone();
        let relative = format!("{bucket}/{key}");
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &relative))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Synchronous key path validation.
    ///
    /// Returns an error if the key would escape the storage root, including
    /// through a symlink anywhere along the path.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }

        let path = root.join(key);

        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        // Existing paths (including broken symlinks) must resolve inside the root.
        match std::fs::symlink_metadata(&path) {
            Ok(meta) => {
                let canonical = path.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!(
                            "symlink target missing or invalid: {key}"
                        ))
                    } else {
                        StorageError::Io(std::io::Error::new(
                            e.kind(),
                            format!("failed to canonicalize path: {e}"),
                        ))
                    }
                })?;

                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(StorageError::Io(std::io::Error::new(
                    err.kind(),
                    format!("failed to stat path: {err}"),
                )));
            }
        }

        // New paths: the nearest existing ancestor must resolve inside the root.
        let mut ancestor = path.as_path();
        while let Some(parent) = ancestor.parent() {
            match std::fs::symlink_metadata(parent) {
                Ok(meta) => {
                    let parent_canonical = parent.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "ancestor symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize ancestor: {e}"),
                            ))
                        }
                    })?;

                    if !parent_canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "ancestor path escapes storage root: {key}"
                        )));
                    }
                    break;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat ancestor: {err}"),
                    )));
                }
            }
            ancestor = parent;
        }

        Ok(path)
    }

    /// Write `data` to a fresh staging file and fsync it.
    async fn stage(&self, data: &[u8]) -> StorageResult<PathBuf> {
        let staging_path = self.root.join(STAGING_DIR).join(Uuid::new_v4().to_string());
        let result = async {
            let mut file = fs::File::create(&staging_path).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&staging_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(staging_path)
    }
}

/// Resolve an HTTP `Range` header against an object of `len` bytes.
///
/// Returns the inclusive byte span to serve, or `None` to serve the whole
/// object when the header is not a single well-formed `bytes=` range.
/// A well-formed range that starts past the end is unsatisfiable.
pub(crate) fn resolve_range(header: &str, len: u64) -> StorageResult<Option<(u64, u64)>> {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if spec.contains(',') {
        return Ok(None);
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return Ok(None);
    };
    let (first, last) = (first.trim(), last.trim());

    let unsatisfiable = || StorageError::InvalidRange(format!("{header} of {len} bytes"));

    if first.is_empty() {
        // Suffix range: the last N bytes.
        let Ok(suffix) = last.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || len == 0 {
            return Err(unsatisfiable());
        }
        return Ok(Some((len.saturating_sub(suffix), len - 1)));
    }

    let Ok(start) = first.parse::<u64>() else {
        return Ok(None);
    };
    let end = if last.is_empty() {
        len.saturating_sub(1)
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end,
            _ => return Ok(None),
        }
    };
    if start >= len {
        return Err(unsatisfiable());
    }
    Ok(Some((start, end.min(len - 1))))
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.existing_bucket(bucket).await {
            Ok(_) => Ok(true),
            Err(StorageError::BucketNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StorageError::BucketAlreadyExists(bucket.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(bucket, key).await?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ObjectMeta { size: meta.len() }),
            Ok(_) => Err(StorageError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> StorageResult<ObjectDownload> {
        let path = self.key_path(bucket, key).await?;
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let len = file.metadata().await?.len();

        let span = match range {
            Some(header) => resolve_range(header, len)?,
            None => None,
        };
        let (start, remaining, content_range) = match span {
            Some((start, end)) => (start, end - start + 1, Some(format!("bytes {start}-{end}/{len}"))),
            None => (0, len, None),
        };
        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start)).await?;
        }

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut remaining = remaining;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            while remaining > 0 {
                let want = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
                let n = file.read(&mut buf[..want]).await?;
                if n == 0 {
                    break;
                }
                remaining -= n as u64;
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(ObjectDownload {
            body: Box::pin(stream),
            content_length: Some(remaining),
            content_range,
        })
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Bytes, mode: PutMode) -> StorageResult<()> {
        self.existing_bucket(bucket).await?;
        let path = self.key_path(bucket, key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging_path = self.stage(&data).await?;
        let published = match mode {
            PutMode::Overwrite => fs::rename(&staging_path, &path).await,
            // link(2) fails if the target exists, so exactly one writer wins.
            PutMode::IfAbsent => fs::hard_link(&staging_path, &path).await,
        };
        if mode == PutMode::IfAbsent || published.is_err() {
            let _ = fs::remove_file(&staging_path).await;
        }

        published.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StorageError::PreconditionFailed(format!("{bucket}/{key}"))
            } else {
                StorageError::Io(e)
            }
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.key_path(bucket, key).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ListEntry>> {
        let bucket_path = self.existing_bucket(bucket).await?;

        // Only walk the directory part of the prefix.
        let start = match prefix.rfind('/') {
            Some(idx) => self.key_path(bucket, &prefix[..idx]).await?,
            None => bucket_path.clone(),
        };

        let mut results = Vec::new();
        match fs::try_exists(&start).await {
            Ok(true) => {}
            Ok(false) => return Ok(results),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // file_type() does not follow symlinks; symlinks are skipped.
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && let Ok(rel) = path.strip_prefix(&bucket_path)
                {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        let size = entry.metadata().await?.len();
                        results.push(ListEntry::new(key, size));
                    }
                }
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
