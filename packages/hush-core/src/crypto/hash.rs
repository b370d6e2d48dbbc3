//! SHA-256 content hashing.

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

use super::encoding::to_hex;

/// Size of a SHA-256 digest in bytes
pub const DIGEST_SIZE: usize = 32;

/// SHA-256 of `data`
pub fn sha256(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// SHA-256 over several parts, fed in order without separators
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; DIGEST_SIZE] {
    let mut h = Sha256::new();
    for part in parts {
        h.update(part);
    }
    h.finalize().into()
}

/// Lowercase hex SHA-256 of `data`
pub fn content_hash(data: &[u8]) -> String {
    to_hex(&sha256(data))
}

/// Compare two hex digests in constant time, ignoring hex case
pub fn digests_match(a: &str, b: &str) -> bool {
    constant_time_eq(
        a.to_ascii_lowercase().as_bytes(),
        b.to_ascii_lowercase().as_bytes(),
    )
}
