//! Vote round state machine — manages one proposal's voting lifecycle.
//!
//! A round is created when a proposal goes out (or, on a voter, never: voters
//! are stateless and just reply). It collects at most one vote per voter,
//! verifies accept signatures as they arrive, and settles once the accept
//! count reaches the majority threshold. A round that times out expires and
//! its proposal is dropped; nothing was flipped, so the cids simply return
//! with the next proposal.

use std::collections::HashMap;

use relaynet_crypto::{decode_address, verify_signature};
use relaynet_messages::VoteReceipt;
use relaynet_types::{BlockHash, Signature, SignerAddress, Timestamp};

/// The lifecycle state of a vote round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Collecting votes.
    Open,
    /// Reached the accept threshold. Terminal state.
    Settled,
    /// Timed out before reaching the threshold. Terminal state.
    Expired,
}

/// What happened to an incoming vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Counted.
    Recorded,
    /// This voter already voted in this round; first vote stands.
    Duplicate,
    /// The round is settled or expired.
    Closed,
    /// The accept signature does not verify against the voter's address.
    InvalidSignature,
}

/// One proposal's vote tally.
#[derive(Clone, Debug)]
pub struct VoteRound {
    /// Hash of the proposed block, the message every accept signature covers.
    pub block_hash: BlockHash,
    /// Current lifecycle state.
    pub state: RoundState,
    /// When the round opened.
    pub created_at: Timestamp,
    accepts: HashMap<SignerAddress, Signature>,
    rejects: HashMap<SignerAddress, Option<String>>,
    threshold: usize,
}

impl VoteRound {
    /// Open a round for one proposed block.
    ///
    /// `threshold` comes from [`crate::quorum_threshold`] over the voting
    /// population frozen at round start.
    pub fn new(block_hash: BlockHash, threshold: usize, now: Timestamp) -> Self {
        Self {
            block_hash,
            state: RoundState::Open,
            created_at: now,
            accepts: HashMap::new(),
            rejects: HashMap::new(),
            threshold,
        }
    }

    /// Record an accepting vote. The signature must cover the block hash
    /// bytes and verify against the key embedded in the voter's address;
    /// forged receipts are refused here so settled evidence always passes
    /// the receivers' own verification.
    pub fn record_accept(
        &mut self,
        voter: &SignerAddress,
        signature: Signature,
    ) -> VoteOutcome {
        if self.state != RoundState::Open {
            return VoteOutcome::Closed;
        }
        if self.accepts.contains_key(voter) || self.rejects.contains_key(voter) {
            return VoteOutcome::Duplicate;
        }
        let Some(public_key) = decode_address(voter.as_str()) else {
            return VoteOutcome::InvalidSignature;
        };
        if !verify_signature(self.block_hash.as_bytes(), &signature, &public_key) {
            return VoteOutcome::InvalidSignature;
        }
        self.accepts.insert(voter.clone(), signature);
        VoteOutcome::Recorded
    }

    /// Record a rejecting vote with its optional reason code.
    pub fn record_reject(&mut self, voter: &SignerAddress, reason: Option<String>) -> VoteOutcome {
        if self.state != RoundState::Open {
            return VoteOutcome::Closed;
        }
        if self.accepts.contains_key(voter) || self.rejects.contains_key(voter) {
            return VoteOutcome::Duplicate;
        }
        self.rejects.insert(voter.clone(), reason);
        VoteOutcome::Recorded
    }

    pub fn accept_count(&self) -> usize {
        self.accepts.len()
    }

    pub fn reject_count(&self) -> usize {
        self.rejects.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the accept tally has reached the threshold.
    pub fn has_quorum(&self) -> bool {
        self.accepts.len() >= self.threshold
    }

    /// Settle the round if quorum is reached.
    ///
    /// Returns the accept receipts — the commit evidence — ordered by voter
    /// address so every node that relays them produces identical bytes.
    /// Returns `None` while short of quorum or once already settled.
    pub fn try_settle(&mut self) -> Option<Vec<VoteReceipt>> {
        if self.state != RoundState::Open || !self.has_quorum() {
            return None;
        }
        self.state = RoundState::Settled;

        let mut receipts: Vec<VoteReceipt> = self
            .accepts
            .iter()
            .map(|(voter, signature)| VoteReceipt {
                voter: voter.clone(),
                signature: signature.clone(),
            })
            .collect();
        receipts.sort_by(|a, b| a.voter.cmp(&b.voter));
        Some(receipts)
    }

    /// Expire the round if it has outlived `timeout_secs`. Returns whether
    /// the state changed.
    pub fn check_timeout(&mut self, timeout_secs: u64, now: Timestamp) -> bool {
        if self.state != RoundState::Open {
            return false;
        }
        if self.created_at.has_expired(timeout_secs, now) {
            self.state = RoundState::Expired;
            true
        } else {
            false
        }
    }

    /// Reject reasons seen so far, for diagnostics.
    pub fn rejections(&self) -> impl Iterator<Item = (&SignerAddress, Option<&str>)> {
        self.rejects
            .iter()
            .map(|(voter, reason)| (voter, reason.as_deref()))
    }
}

/// Verify commit evidence: at least `threshold` distinct voters whose
/// signatures over `block_hash` verify against their addresses.
///
/// Duplicated voters count once; receipts that fail to decode or verify are
/// skipped rather than failing the whole set.
pub fn quorum_evidence_valid(
    block_hash: &BlockHash,
    votes: &[VoteReceipt],
    threshold: usize,
) -> bool {
    let mut counted: Vec<&SignerAddress> = Vec::with_capacity(votes.len());
    for receipt in votes {
        if counted.contains(&&receipt.voter) {
            continue;
        }
        let Some(public_key) = decode_address(receipt.voter.as_str()) else {
            continue;
        };
        if verify_signature(block_hash.as_bytes(), &receipt.signature, &public_key) {
            counted.push(&receipt.voter);
        }
    }
    counted.len() >= threshold
}
