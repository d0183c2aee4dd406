//! Behaviour every `ObjectStore` backend must share.

use super::fixtures::{blob_name, collect, seeded_bytes};
use bytes::Bytes;
use restgate_storage::{ObjectStore, PutMode, StorageError};

/// Run the shared backend contract against a fresh, not yet created bucket.
pub async fn run_contract(store: &dyn ObjectStore, bucket: &str) {
    buckets(store, bucket).await;
    conditional_writes(store, bucket).await;
    ranges(store, bucket).await;
    listing(store, bucket).await;
    deletes(store, bucket).await;
}

async fn buckets(store: &dyn ObjectStore, bucket: &str) {
    assert!(!store.bucket_exists(bucket).await.unwrap());
    store.create_bucket(bucket).await.unwrap();
    assert!(store.bucket_exists(bucket).await.unwrap());
    assert!(matches!(
        store.create_bucket(bucket).await,
        Err(StorageError::BucketAlreadyExists(_))
    ));
}

async fn conditional_writes(store: &dyn ObjectStore, bucket: &str) {
    let key = format!("data/{}", blob_name(1));
    let first = seeded_bytes(1, 200_000);

    store
        .put(bucket, &key, first.clone(), PutMode::IfAbsent)
        .await
        .unwrap();
    let again = store
        .put(bucket, &key, seeded_bytes(2, 10), PutMode::IfAbsent)
        .await;
    assert!(
        matches!(again, Err(StorageError::PreconditionFailed(_))),
        "second conditional write must fail, got {again:?}"
    );

    assert_eq!(store.head(bucket, &key).await.unwrap().size, 200_000);
    let download = store.get(bucket, &key, None).await.unwrap();
    assert!(!download.is_partial());
    assert_eq!(collect(download).await.unwrap(), first.to_vec());

    store
        .put(bucket, "config", Bytes::from_static(b"v1"), PutMode::Overwrite)
        .await
        .unwrap();
    store
        .put(bucket, "config", Bytes::from_static(b"v2"), PutMode::Overwrite)
        .await
        .unwrap();
    let download = store.get(bucket, "config", None).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), b"v2");
}

async fn ranges(store: &dyn ObjectStore, bucket: &str) {
    let key = format!("data/{}", blob_name(2));
    store
        .put(
            bucket,
            &key,
            Bytes::from_static(b"test-blob-data"),
            PutMode::Overwrite,
        )
        .await
        .unwrap();

    let download = store.get(bucket, &key, Some("bytes=0-3")).await.unwrap();
    assert!(download.is_partial());
    assert_eq!(download.content_range.as_deref(), Some("bytes 0-3/14"));
    assert_eq!(collect(download).await.unwrap(), b"test");

    let download = store.get(bucket, &key, Some("bytes=5-")).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), b"blob-data");

    assert!(matches!(
        store.get(bucket, "data/missing", None).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store.head(bucket, "data/missing").await,
        Err(StorageError::NotFound(_))
    ));
}

async fn listing(store: &dyn ObjectStore, bucket: &str) {
    for n in 10..13 {
        store
            .put(
                bucket,
                &format!("snapshots/{}", blob_name(n)),
                seeded_bytes(n, n as usize),
                PutMode::Overwrite,
            )
            .await
            .unwrap();
    }

    let mut entries = store.list(bucket, "snapshots/").await.unwrap();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    let listed: Vec<(String, u64)> = entries
        .into_iter()
        .map(|e| (e.key.unwrap(), e.size.unwrap()))
        .collect();
    let expected: Vec<(String, u64)> = (10..13)
        .map(|n| (format!("snapshots/{}", blob_name(n)), n))
        .collect();
    assert_eq!(listed, expected);

    assert!(store.list(bucket, "keys/").await.unwrap().is_empty());
}

async fn deletes(store: &dyn ObjectStore, bucket: &str) {
    let key = format!("locks/{}", blob_name(20));
    store
        .put(bucket, &key, Bytes::from_static(b"lock"), PutMode::IfAbsent)
        .await
        .unwrap();
    store.delete(bucket, &key).await.unwrap();
    assert!(store.head(bucket, &key).await.is_err());
    store.delete(bucket, &key).await.unwrap();

    // The key is free again for a conditional write.
    store
        .put(bucket, &key, Bytes::from_static(b"lock"), PutMode::IfAbsent)
        .await
        .unwrap();
}
