//! Content keys for discovered files
//!
//! A content key is the hex-encoded SHA-256 digest of a file's full byte
//! content. Identical bytes always produce the same key, whatever the file is
//! called or where it lives, so the key is what the ledger deduplicates on.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Read size used while hashing; memory use is bounded by this, not file size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the content key of a file
pub fn compute_content_key(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path.as_ref())?;
    compute_content_key_from_reader(&mut file)
}

/// Compute the content key of any readable source
pub fn compute_content_key_from_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the content key of an in-memory buffer
pub fn compute_content_key_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
