//! Merkle root computation over cid sets.
//!
//! The tree is binary: leaves are the raw 32-byte cids, each parent is
//! Blake2b-256(left ‖ right), and an odd node at the end of a level is
//! promoted unchanged to the next level. A single leaf is itself the root.
//!
//! The input is treated as a set: cids are sorted ascending before the tree
//! is built, so callers can pass them in any order and still agree on the
//! root.

use relaynet_types::{Cid, MerkleRoot};

/// Compute the Merkle root of a cid set. Returns `None` for an empty set —
/// no block is ever built from nothing.
pub fn merkle_root(cids: &[Cid]) -> Option<MerkleRoot> {
    if cids.is_empty() {
        return None;
    }

    let mut level: Vec<[u8; 32]> = cids.iter().map(|c| c.0).collect();
    level.sort_unstable();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut chunks = level.chunks_exact(2);
        for pair in &mut chunks {
            next.push(crate::blake2b_256_multi(&[&pair[0], &pair[1]]));
        }
        if let [leftover] = chunks.remainder() {
            next.push(*leftover);
        }
        level = next;
    }

    Some(MerkleRoot::new(level[0]))
}
