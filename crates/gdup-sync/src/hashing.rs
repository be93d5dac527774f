//! Content hashing for local files
//!
//! The remote store reports an MD5 checksum for every file, so the same
//! digest is computed locally to decide whether an upload can be skipped.
//! Files are streamed in fixed-size chunks and never loaded whole.

use std::path::Path;

use gdup_core::domain::newtypes::ContentHash;
use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::SyncError;

/// Read size used while hashing
const CHUNK_SIZE: usize = 8192;

/// MD5 digest and byte length of a local file
pub async fn md5_file(path: &Path) -> Result<(ContentHash, u64), SyncError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::io(path, e))?;

    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size = 0u64;
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    Ok((ContentHash::from_digest(hasher.finalize().into()), size))
}

/// MD5 digest of an in-memory buffer
pub fn md5_bytes(data: &[u8]) -> ContentHash {
    ContentHash::from_digest(Md5::digest(data).into())
}
