//! The block record: a Merkle-rooted batch of message cids.
//!
//! Blocks form a single append-only chain. Height 0 is the genesis block
//! and carries [`BlockHash::ZERO`] as its `previous_hash`; every later
//! block links to the hash of its predecessor.

use serde::{Deserialize, Serialize};

use crate::{BlockHash, Cid, MerkleRoot, Signature, SignerAddress};

/// A proposed or committed block.
///
/// The block hash is Blake2b-256 over [`Block::signing_bytes`], which
/// deliberately excludes the signature: the proposer signs the hash, so the
/// signature cannot be part of its own preimage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Height in the chain, dense from 0.
    pub idx: u64,
    /// Hash of the predecessor block, `BlockHash::ZERO` at height 0.
    pub previous_hash: BlockHash,
    /// Merkle root over `cids`.
    pub merkle_root: MerkleRoot,
    /// Content identifiers included in this block, ascending, no duplicates.
    pub cids: Vec<Cid>,
    /// Address of the proposing node.
    pub proposer: SignerAddress,
    /// Proposal time, Unix seconds.
    pub timestamp: u64,
    /// Proposer's Ed25519 signature over the block hash.
    pub signature: Signature,
}

impl Block {
    /// Canonical byte encoding of everything the block hash covers.
    ///
    /// Layout: `idx` (8 bytes BE) ‖ `previous_hash` ‖ `merkle_root` ‖ each
    /// cid in list order ‖ `proposer` (UTF-8) ‖ `timestamp` (8 bytes BE).
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(8 + 32 + 32 + self.cids.len() * 32 + self.proposer.as_str().len() + 8);
        bytes.extend_from_slice(&self.idx.to_be_bytes());
        bytes.extend_from_slice(self.previous_hash.as_bytes());
        bytes.extend_from_slice(self.merkle_root.as_bytes());
        for cid in &self.cids {
            bytes.extend_from_slice(cid.as_bytes());
        }
        bytes.extend_from_slice(self.proposer.as_str().as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes
    }

    /// Whether this block sits at the start of the chain.
    pub fn is_genesis(&self) -> bool {
        self.idx == 0 && self.previous_hash.is_zero()
    }
}
