//! Content-hash verification of local files.
//!
//! The whole file is always hashed; a partial match is meaningless for
//! content addressing. Absence and read failure are indistinguishable from
//! a mismatch on purpose: every caller reacts the same way, by (re)fetching.

use std::io::Read;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use lumen_schema::hash::HashValue;
use lumen_schema::HashAlgorithm;

/// Compute the hex digest of a file's full contents.
///
/// Blocking; callers in async context go through [`verify_file`].
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be read.
pub fn digest_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    match algorithm {
        HashAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            loop {
                let count = file.read(&mut buffer)?;
                if count == 0 {
                    break;
                }
                hasher.update(&buffer[..count]);
            }
            Ok(hex::encode(hasher.finalize()))
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let count = file.read(&mut buffer)?;
                if count == 0 {
                    break;
                }
                hasher.update(&buffer[..count]);
            }
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

/// Check whether a local file's contents hash to `expected`.
///
/// Returns `false` when the file is missing or unreadable; never errors.
/// Comparison is case-insensitive (digests are normalized to lowercase).
pub async fn verify_file(path: &Path, expected: &HashValue) -> bool {
    let path = path.to_path_buf();
    let algorithm = expected.algorithm();
    let expected = expected.as_str().to_ascii_lowercase();
    let result = tokio::task::spawn_blocking(move || digest_file(&path, algorithm)).await;
    match result {
        Ok(Ok(actual)) => actual == expected,
        Ok(Err(_)) | Err(_) => false,
    }
}
