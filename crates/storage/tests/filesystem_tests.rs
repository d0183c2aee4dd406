mod common;

use bytes::Bytes;
use common::contract::run_contract;
use common::fixtures::{blob_name, collect, seeded_bytes};
use restgate_storage::{FilesystemBackend, ObjectStore, PutMode, StorageError};
use std::sync::Arc;

#[tokio::test]
async fn test_filesystem_contract() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FilesystemBackend::new(dir.path()).await.unwrap();
    run_contract(&backend, "contract-repo").await;
}

#[tokio::test]
async fn test_buckets_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FilesystemBackend::new(dir.path()).await.unwrap();
    backend.create_bucket("repo-a").await.unwrap();
    backend.create_bucket("repo-b").await.unwrap();

    let key = format!("data/{}", blob_name(1));
    backend
        .put("repo-a", &key, Bytes::from_static(b"a"), PutMode::IfAbsent)
        .await
        .unwrap();
    backend
        .put("repo-b", &key, Bytes::from_static(b"b"), PutMode::IfAbsent)
        .await
        .unwrap();

    let a = collect(backend.get("repo-a", &key, None).await.unwrap())
        .await
        .unwrap();
    assert_eq!(a, b"a");
    assert_eq!(backend.list("repo-b", "data/").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_large_object_streams_in_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FilesystemBackend::new(dir.path()).await.unwrap();
    backend.create_bucket("repo").await.unwrap();

    let data = seeded_bytes(7, 1024 * 1024 + 17);
    backend
        .put("repo", "data/big", data.clone(), PutMode::Overwrite)
        .await
        .unwrap();

    let download = backend.get("repo", "data/big", None).await.unwrap();
    assert_eq!(download.content_length, Some(data.len() as u64));
    assert_eq!(collect(download).await.unwrap(), data.to_vec());

    let download = backend
        .get("repo", "data/big", Some("bytes=1048576-"))
        .await
        .unwrap();
    assert_eq!(download.content_length, Some(17));
    assert_eq!(collect(download).await.unwrap(), data[1024 * 1024..].to_vec());
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FilesystemBackend::new(dir.path()).await.unwrap();
    backend.create_bucket("repo").await.unwrap();
    backend
        .put("repo", "config", Bytes::from_static(b"abc"), PutMode::Overwrite)
        .await
        .unwrap();

    assert!(matches!(
        backend.get("repo", "config", Some("bytes=10-20")).await,
        Err(StorageError::InvalidRange(_))
    ));
    // Unparseable ranges fall back to the full object.
    let download = backend
        .get("repo", "config", Some("lines=1-2"))
        .await
        .unwrap();
    assert!(!download.is_partial());
    assert_eq!(collect(download).await.unwrap(), b"abc");
}

#[tokio::test]
async fn test_dropping_download_releases_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    backend.create_bucket("repo").await.unwrap();
    backend
        .put("repo", "data/x", seeded_bytes(3, 512 * 1024), PutMode::Overwrite)
        .await
        .unwrap();

    let download = backend.get("repo", "data/x", None).await.unwrap();
    drop(download);

    backend.delete("repo", "data/x").await.unwrap();
    assert!(backend.list("repo", "data/").await.unwrap().is_empty());
}
