use bytes::Bytes;
use futures::TryStreamExt;
use restgate_storage::{ObjectDownload, StorageResult};

/// Deterministic pseudo-random test data; the same seed gives the same bytes.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// A 64-character hex blob name derived from `n`.
pub fn blob_name(n: u64) -> String {
    format!("{n:064x}")
}

/// Drain a download into memory.
pub async fn collect(download: ObjectDownload) -> StorageResult<Vec<u8>> {
    let chunks: Vec<Bytes> = download.body.try_collect().await?;
    Ok(chunks.concat())
}
