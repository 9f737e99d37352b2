//! Blake2b-256 hashing.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Compute the Blake2b-256 hash of a byte slice.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Blake2b-256 hash over multiple byte slices in order.
///
/// Equivalent to hashing the concatenation without allocating it.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(blake2b_256(b"relaynet"), blake2b_256(b"relaynet"));
        assert_ne!(blake2b_256(b"relaynet"), blake2b_256(b"relaynet2"));
    }

    #[test]
    fn multi_matches_concatenation() {
        let joined = blake2b_256(b"hello world");
        let parts = blake2b_256_multi(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn empty_input_hashes() {
        let h = blake2b_256(b"");
        assert_eq!(h.len(), 32);
        assert_eq!(h, blake2b_256_multi(&[]));
    }
}
