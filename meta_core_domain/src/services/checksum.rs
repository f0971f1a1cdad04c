//! Content hashing used by the fast and background pipeline stages.
//!
//! The fast stage needs a cheap, deterministic identifier before committing
//! to a full read of potentially very large media files; it hashes three
//! fixed-size slices (head, middle, tail) instead of the whole file. The
//! background stage later computes the authoritative full-file hash over
//! the same bytes once the fast-class plugins have settled.

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::CoreError;
use crate::value_objects::HashId;

/// Size of each of the three sampled slices making up the midhash.
const SLICE_LEN: u64 = 64 * 1024;

/// Computes the midhash: SHA-256 over the head, middle, and tail slices of
/// the file, each up to `SLICE_LEN` bytes, concatenated in that order. For
/// files smaller than `3 * SLICE_LEN` the slices overlap; the hash remains
/// deterministic because the offsets are a pure function of file size.
pub async fn compute_midhash(path: &std::path::Path) -> Result<HashId, CoreError> {
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();

    let mut hasher = Sha256::new();
    for offset in slice_offsets(len) {
        hash_slice(&mut file, &mut hasher, offset, SLICE_LEN.min(len)).await?;
    }
    let digest = hasher.finalize();
    HashId::from_hex(hex::encode(digest))
}

/// Computes the full-file SHA-256 hash, streaming the file in fixed-size
/// chunks rather than reading it entirely into memory.
pub async fn compute_full_hash(path: &std::path::Path) -> Result<HashId, CoreError> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    HashId::from_hex(hex::encode(digest))
}

fn slice_offsets(len: u64) -> [u64; 3] {
    if len == 0 {
        return [0, 0, 0];
    }
    let head = 0;
    let tail = len.saturating_sub(SLICE_LEN);
    let mid = len.saturating_sub(SLICE_LEN) / 2;
    [head, mid, tail]
}

async fn hash_slice(file: &mut File, hasher: &mut Sha256, offset: u64, max_len: u64) -> Result<(), CoreError> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut remaining = max_len;
    let mut buf = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(())
}
