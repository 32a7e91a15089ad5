//! Truncated SHA-256 fingerprints.
//!
//! Bytes are hashed as-is: no newline normalisation, so the in-memory and
//! on-disk forms agree exactly for identical bytes.

use std::io::Read;
use std::path::Path;

use docrefresh_core::Fingerprint;
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 12;

pub fn content_fingerprint(content: impl AsRef<[u8]>) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    truncate(hasher)
}

/// Streamed file hash; equal to [`content_fingerprint`] of the file's bytes.
pub fn file_fingerprint(path: &Path) -> Result<Fingerprint, SyncError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(truncate(hasher))
}

fn truncate(hasher: Sha256) -> Fingerprint {
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    Fingerprint(hex)
}
