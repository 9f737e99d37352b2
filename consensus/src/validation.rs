//! Proposal validation.
//!
//! Validation runs against a [`ChainView`] snapshot so it is pure and
//! synchronously testable; nothing here touches the network or takes locks.
//! Checks run in a fixed order and the first failure names the rejection, so
//! two nodes refusing the same proposal report the same reason. Continuity
//! comes first: competing proposals for one height need no resolution
//! protocol, the one that does not extend the local tip is simply refused.

use relaynet_crypto::{block_hash, merkle_root, verify_block_signature};
use relaynet_types::{Block, BlockHash, Cid};

/// Read-only view of local chain and message state during validation.
pub trait ChainView {
    /// Height and hash of the local tip, `None` on an empty chain.
    fn tip(&self) -> Option<(u64, BlockHash)>;

    /// Whether this node holds the message and has acked it as delivered.
    fn message_delivered(&self, cid: &Cid) -> bool;
}

/// Why a proposal was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("block does not extend the local tip")]
    ContinuityMismatch,
    #[error("proposer signature does not verify")]
    InvalidSignature,
    #[error("block carries no cids")]
    EmptyProposal,
    #[error("block exceeds the cid cap")]
    TooManyCids,
    #[error("cids are not strictly ascending")]
    UnsortedCids,
    #[error("merkle root does not match the cid list")]
    MerkleMismatch,
    #[error("block references content this node does not hold")]
    UnknownContent,
}

impl RejectReason {
    /// Stable machine-readable code carried in vote replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContinuityMismatch => "continuity_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::EmptyProposal => "empty_proposal",
            Self::TooManyCids => "too_many_cids",
            Self::UnsortedCids => "unsorted_cids",
            Self::MerkleMismatch => "merkle_mismatch",
            Self::UnknownContent => "unknown_content",
        }
    }
}

/// Validates proposed blocks against a chain view.
#[derive(Clone, Copy, Debug)]
pub struct ProposalValidator {
    max_block_cids: usize,
}

impl ProposalValidator {
    pub fn new(max_block_cids: usize) -> Self {
        Self { max_block_cids }
    }

    /// Validate a live proposal. Returns the recomputed block hash — the
    /// thing an accepting voter signs — or the first failing check.
    ///
    /// Order: continuity, proposer signature, structure + merkle, content.
    pub fn validate(&self, view: &dyn ChainView, block: &Block) -> Result<BlockHash, RejectReason> {
        self.run(view, block, true)
    }

    /// Validate a historical block during catch-up sync.
    ///
    /// Same checks minus content sanity: the payloads behind an old block
    /// may never have been replicated to this node.
    pub fn validate_historical(
        &self,
        view: &dyn ChainView,
        block: &Block,
    ) -> Result<BlockHash, RejectReason> {
        self.run(view, block, false)
    }

    fn run(
        &self,
        view: &dyn ChainView,
        block: &Block,
        check_content: bool,
    ) -> Result<BlockHash, RejectReason> {
        match view.tip() {
            Some((tip_idx, tip_hash)) => {
                if block.idx != tip_idx + 1 || block.previous_hash != tip_hash {
                    return Err(RejectReason::ContinuityMismatch);
                }
            }
            None => {
                if !block.is_genesis() {
                    return Err(RejectReason::ContinuityMismatch);
                }
            }
        }

        if !verify_block_signature(block) {
            return Err(RejectReason::InvalidSignature);
        }

        if block.cids.is_empty() {
            return Err(RejectReason::EmptyProposal);
        }
        if block.cids.len() > self.max_block_cids {
            return Err(RejectReason::TooManyCids);
        }
        if !block.cids.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(RejectReason::UnsortedCids);
        }
        if merkle_root(&block.cids) != Some(block.merkle_root) {
            return Err(RejectReason::MerkleMismatch);
        }

        if check_content {
            for cid in &block.cids {
                if !view.message_delivered(cid) {
                    return Err(RejectReason::UnknownContent);
                }
            }
        }

        Ok(block_hash(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaynet_crypto::{derive_address, keypair_from_seed, sign_block};
    use relaynet_types::{KeyPair, MerkleRoot, Signature};

    struct MockView {
        tip: Option<(u64, BlockHash)>,
        delivered: Vec<Cid>,
    }

    impl ChainView for MockView {
        fn tip(&self) -> Option<(u64, BlockHash)> {
            self.tip
        }

        fn message_delivered(&self, cid: &Cid) -> bool {
            self.delivered.contains(cid)
        }
    }

    fn proposer() -> KeyPair {
        keypair_from_seed(&[7u8; 32])
    }

    fn signed_block(idx: u64, previous_hash: BlockHash, cids: Vec<Cid>) -> Block {
        let kp = proposer();
        let mut block = Block {
            idx,
            previous_hash,
            merkle_root: merkle_root(&cids).unwrap_or(MerkleRoot::new([0u8; 32])),
            cids,
            proposer: derive_address(&kp.public),
            timestamp: 1_700_000_000,
            signature: Signature([0u8; 64]),
        };
        block.signature = sign_block(&block, &kp.private);
        block
    }

    fn cids(bytes: &[u8]) -> Vec<Cid> {
        bytes.iter().map(|b| Cid::new([*b; 32])).collect()
    }

    fn genesis_view(delivered: Vec<Cid>) -> MockView {
        MockView {
            tip: None,
            delivered,
        }
    }

    #[test]
    fn accepts_valid_genesis() {
        let block = signed_block(0, BlockHash::ZERO, cids(&[1, 2, 3]));
        let view = genesis_view(cids(&[1, 2, 3]));
        let validator = ProposalValidator::new(20);

        let hash = validator.validate(&view, &block).unwrap();
        assert_eq!(hash, block_hash(&block));
    }

    #[test]
    fn accepts_valid_successor() {
        let genesis = signed_block(0, BlockHash::ZERO, cids(&[1]));
        let tip_hash = block_hash(&genesis);
        let block = signed_block(1, tip_hash, cids(&[2, 3]));
        let view = MockView {
            tip: Some((0, tip_hash)),
            delivered: cids(&[2, 3]),
        };

        assert!(ProposalValidator::new(20).validate(&view, &block).is_ok());
    }

    #[test]
    fn rejects_wrong_height() {
        let block = signed_block(2, BlockHash::ZERO, cids(&[1]));
        let view = genesis_view(cids(&[1]));

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::ContinuityMismatch)
        );
    }

    #[test]
    fn rejects_wrong_previous_hash() {
        let block = signed_block(1, BlockHash::new([9u8; 32]), cids(&[1]));
        let view = MockView {
            tip: Some((0, BlockHash::new([1u8; 32]))),
            delivered: cids(&[1]),
        };

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::ContinuityMismatch)
        );
    }

    #[test]
    fn continuity_failure_masks_bad_signature() {
        let mut block = signed_block(5, BlockHash::new([9u8; 32]), cids(&[1]));
        block.signature = Signature([0u8; 64]);
        let view = genesis_view(cids(&[1]));

        // Both continuity and signature are wrong; continuity is reported.
        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::ContinuityMismatch)
        );
    }

    #[test]
    fn rejects_tampered_block() {
        let mut block = signed_block(0, BlockHash::ZERO, cids(&[1, 2]));
        block.timestamp += 1;
        let view = genesis_view(cids(&[1, 2]));

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn rejects_empty_cid_list() {
        let block = signed_block(0, BlockHash::ZERO, vec![]);
        let view = genesis_view(vec![]);

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::EmptyProposal)
        );
    }

    #[test]
    fn rejects_oversized_cid_list() {
        let block = signed_block(0, BlockHash::ZERO, cids(&[1, 2, 3]));
        let view = genesis_view(cids(&[1, 2, 3]));

        assert_eq!(
            ProposalValidator::new(2).validate(&view, &block),
            Err(RejectReason::TooManyCids)
        );
    }

    #[test]
    fn rejects_unsorted_and_duplicate_cids() {
        let unsorted = signed_block(0, BlockHash::ZERO, cids(&[2, 1]));
        let duplicated = signed_block(0, BlockHash::ZERO, cids(&[1, 1]));
        let view = genesis_view(cids(&[1, 2]));
        let validator = ProposalValidator::new(20);

        assert_eq!(
            validator.validate(&view, &unsorted),
            Err(RejectReason::UnsortedCids)
        );
        assert_eq!(
            validator.validate(&view, &duplicated),
            Err(RejectReason::UnsortedCids)
        );
    }

    #[test]
    fn rejects_wrong_merkle_root() {
        let kp = proposer();
        let mut block = Block {
            idx: 0,
            previous_hash: BlockHash::ZERO,
            merkle_root: MerkleRoot::new([0xAA; 32]),
            cids: cids(&[1, 2]),
            proposer: derive_address(&kp.public),
            timestamp: 1_700_000_000,
            signature: Signature([0u8; 64]),
        };
        block.signature = sign_block(&block, &kp.private);
        let view = genesis_view(cids(&[1, 2]));

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::MerkleMismatch)
        );
    }

    #[test]
    fn rejects_unknown_content() {
        let block = signed_block(0, BlockHash::ZERO, cids(&[1, 2]));
        let view = genesis_view(cids(&[1])); // cid 2 never delivered here

        assert_eq!(
            ProposalValidator::new(20).validate(&view, &block),
            Err(RejectReason::UnknownContent)
        );
    }

    #[test]
    fn historical_validation_skips_content() {
        let block = signed_block(0, BlockHash::ZERO, cids(&[1, 2]));
        let view = genesis_view(vec![]);
        let validator = ProposalValidator::new(20);

        assert!(validator.validate(&view, &block).is_err());
        assert!(validator.validate_historical(&view, &block).is_ok());
    }

    #[test]
    fn reject_codes_are_stable() {
        assert_eq!(RejectReason::ContinuityMismatch.code(), "continuity_mismatch");
        assert_eq!(RejectReason::UnknownContent.code(), "unknown_content");
    }
}
