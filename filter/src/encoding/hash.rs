//! Double SHA-256, the hash behind txids, wtxids and Base58Check checksums.

use sha2::{Digest, Sha256};

/// `SHA256(SHA256(data))`.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}
