//! Periodic block proposal loop.
//!
//! Every tick the proposer drains the pending queue (delivered but not yet
//! committed messages), bundles the cids into a candidate block on top of
//! the local tip, signs it, and puts it to a vote. Its own accept vote is
//! recorded first; peer votes are collected within the vote window. Quorum
//! settles the round into signed receipts which commit the block locally
//! and fan out to every online peer. A round that falls short is simply
//! dropped — the cids stay pending and ride the next tick.

use std::sync::Arc;
use std::time::Duration;

use relaynet_consensus::VoteRound;
use relaynet_crypto::{block_hash, merkle_root, sign_block, sign_message};
use relaynet_messages::{CommitRequest, VoteReceipt};
use relaynet_network::Gossip;
use relaynet_rpc::{apply_committed_block, local_quorum_threshold, AppState};
use relaynet_store::{BlockStore, MessageStore};
use relaynet_types::{Block, BlockHash, Cid, Signature, Timestamp};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::NodeError;

/// What a single proposal round ended as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// A previous round was still running.
    InFlight,
    /// Nothing pending, no block proposed.
    Idle,
    /// The vote tally fell short of quorum; the block was dropped.
    NoQuorum,
    /// Quorum was reached but the local commit was refused, e.g. because
    /// the chain advanced mid-round.
    Refused,
    /// The block committed at this height.
    Committed(u64),
}

pub struct Proposer {
    state: AppState,
    gossip: Arc<Gossip>,
    interval_secs: u64,
    vote_timeout_secs: u64,
    /// Held for the duration of a round; `try_lock` failing means a round
    /// is still in flight and the tick is skipped.
    in_flight: Mutex<()>,
}

impl Proposer {
    pub fn new(
        state: AppState,
        gossip: Arc<Gossip>,
        interval_secs: u64,
        vote_timeout_secs: u64,
    ) -> Self {
        Self {
            state,
            gossip,
            interval_secs,
            vote_timeout_secs,
            in_flight: Mutex::new(()),
        }
    }

    /// Run proposal rounds until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("proposer shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_round().await {
                        Ok(ProposalOutcome::Idle) => {}
                        Ok(outcome) => debug!(?outcome, "proposal round finished"),
                        Err(e) => warn!("proposal round failed: {e}"),
                    }
                }
            }
        }
    }

    /// One full proposal round: bundle, sign, vote, commit or drop.
    pub async fn run_round(&self) -> Result<ProposalOutcome, NodeError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("previous proposal round still in flight, skipping tick");
            return Ok(ProposalOutcome::InFlight);
        };

        let pending = self
            .state
            .messages
            .pending_cids(self.state.settings.max_block_cids)?;
        if pending.is_empty() {
            return Ok(ProposalOutcome::Idle);
        }

        let block = self.build_block(pending)?;
        let hash = block_hash(&block);

        let now = Timestamp::now();
        let threshold = local_quorum_threshold(&self.state, now).await;
        let mut round = VoteRound::new(hash, threshold, now);

        // Our own accept vote. Same receipt shape peers produce, so the
        // settled evidence is uniform.
        let self_signature = sign_message(hash.as_bytes(), &self.state.keypair.private);
        round.record_accept(&self.state.address, self_signature);

        info!(
            height = block.idx,
            cids = block.cids.len(),
            %hash,
            threshold,
            "proposing block"
        );

        let votes = self
            .gossip
            .broadcast_proposal(&block, Duration::from_secs(self.vote_timeout_secs))
            .await;
        for vote in votes {
            if vote.block_hash != hash {
                debug!(voter = %vote.voter, "vote for a different block, ignoring");
                continue;
            }
            if vote.accept {
                if let Some(signature) = vote.signature {
                    round.record_accept(&vote.voter, signature);
                }
            } else {
                round.record_reject(&vote.voter, vote.reason);
            }
        }

        match round.try_settle() {
            Some(receipts) => self.commit(block, receipts).await,
            None => {
                let expired = round.check_timeout(self.vote_timeout_secs, Timestamp::now());
                info!(
                    height = block.idx,
                    accepts = round.accept_count(),
                    rejects = round.reject_count(),
                    threshold = round.threshold(),
                    expired,
                    "proposal dropped without quorum"
                );
                for (voter, reason) in round.rejections() {
                    debug!(%voter, reason = reason.unwrap_or("none"), "rejecting vote");
                }
                Ok(ProposalOutcome::NoQuorum)
            }
        }
    }

    /// Bundle pending cids into a signed candidate on top of the tip.
    fn build_block(&self, mut cids: Vec<Cid>) -> Result<Block, NodeError> {
        cids.sort();

        let merkle = merkle_root(&cids)
            .ok_or_else(|| NodeError::Integrity("merkle root over empty cid set".into()))?;

        let (idx, previous_hash) = match self.state.blocks.tip()? {
            Some(tip) => (tip.idx + 1, block_hash(&tip)),
            None => (0, BlockHash::ZERO),
        };

        let mut block = Block {
            idx,
            previous_hash,
            merkle_root: merkle,
            cids,
            proposer: self.state.address.clone(),
            timestamp: Timestamp::now().as_secs(),
            signature: Signature([0u8; 64]),
        };
        block.signature = sign_block(&block, &self.state.keypair.private);
        Ok(block)
    }

    async fn commit(
        &self,
        block: Block,
        receipts: Vec<VoteReceipt>,
    ) -> Result<ProposalOutcome, NodeError> {
        let response = apply_committed_block(&self.state, &block, &receipts).await?;
        if !response.committed {
            warn!(
                height = block.idx,
                reason = response.reason.as_deref().unwrap_or("unknown"),
                "local commit refused after quorum"
            );
            return Ok(ProposalOutcome::Refused);
        }

        let height = response.height.unwrap_or(block.idx);
        let request = CommitRequest {
            block,
            votes: receipts,
        };
        let result = self.gossip.broadcast_commit(&request).await;
        info!(
            height,
            sent = result.sent,
            failed = result.failed,
            "block committed and broadcast"
        );
        Ok(ProposalOutcome::Committed(height))
    }
}
