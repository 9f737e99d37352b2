//! Block hashing and proposer signatures.

use relaynet_types::{Block, BlockHash, PrivateKey, Signature};

/// Compute the hash of a block's canonical signing bytes.
///
/// The signature field is not part of the preimage; two blocks that differ
/// only in signature hash identically.
pub fn block_hash(block: &Block) -> BlockHash {
    BlockHash::new(crate::blake2b_256(&block.signing_bytes()))
}

/// Sign a block's hash with the proposer's private key.
pub fn sign_block(block: &Block, private_key: &PrivateKey) -> Signature {
    let hash = block_hash(block);
    crate::sign_message(hash.as_bytes(), private_key)
}

/// Verify the proposer signature on a block.
///
/// The verify key is recovered from the proposer address; a malformed
/// address fails verification rather than erroring.
pub fn verify_block_signature(block: &Block) -> bool {
    let Some(public_key) = crate::decode_address(block.proposer.as_str()) else {
        return false;
    };
    let hash = block_hash(block);
    crate::verify_signature(hash.as_bytes(), &block.signature, &public_key)
}
