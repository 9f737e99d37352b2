//! Chain glue: the store-backed consensus view and the commit path.
//!
//! `apply_committed_block` is the single entry point for extending the
//! chain with a quorum-backed block. The HTTP commit handler and the
//! proposer's own settle path both go through it, so the evidence check,
//! the continuity re-check, and the flag updates cannot drift apart.

use relaynet_consensus::{quorum_evidence_valid, quorum_threshold, ChainView, ProposalValidator};
use relaynet_crypto::block_hash;
use relaynet_messages::{CommitResponse, VoteReceipt};
use relaynet_store::{BlockStore, MessageStore, StoreError};
use relaynet_types::{Block, BlockHash, Cid, Timestamp};
use tracing::{debug, info, warn};

use crate::error::RpcError;
use crate::state::AppState;

/// [`ChainView`] over the node's stores.
pub struct StoreChainView<'a> {
    blocks: &'a dyn BlockStore,
    messages: &'a dyn MessageStore,
}

impl<'a> StoreChainView<'a> {
    pub fn new(blocks: &'a dyn BlockStore, messages: &'a dyn MessageStore) -> Self {
        Self { blocks, messages }
    }
}

impl ChainView for StoreChainView<'_> {
    fn tip(&self) -> Option<(u64, BlockHash)> {
        match self.blocks.tip() {
            Ok(Some(block)) => Some((block.idx, block_hash(&block))),
            Ok(None) => None,
            // An unreadable tip makes validation fail closed on continuity.
            Err(e) => {
                warn!("chain tip read failed: {e}");
                None
            }
        }
    }

    fn message_delivered(&self, cid: &Cid) -> bool {
        matches!(self.messages.get_message(cid), Ok(Some(record)) if record.delivered)
    }
}

/// Quorum threshold as this node currently sees the network: itself plus
/// its registered peers, stale ones excluded unless configured in.
pub async fn local_quorum_threshold(state: &AppState, now: Timestamp) -> usize {
    let peer_count = if state.settings.quorum_counts_stale {
        state.registry.count().await
    } else {
        state.registry.online_count(now).await
    };
    quorum_threshold(peer_count + 1, state.settings.majority_bps)
}

/// Verify commit evidence and append the block.
///
/// Refusals are protocol outcomes, returned in the [`CommitResponse`];
/// only store failures surface as errors. Re-delivery of an already
/// committed block is acknowledged as committed.
pub async fn apply_committed_block(
    state: &AppState,
    block: &Block,
    votes: &[VoteReceipt],
) -> Result<CommitResponse, RpcError> {
    let hash = block_hash(block);
    let now = Timestamp::now();

    let threshold = local_quorum_threshold(state, now).await;
    if !quorum_evidence_valid(&hash, votes, threshold) {
        debug!(
            height = block.idx,
            %hash,
            threshold,
            receipts = votes.len(),
            "commit evidence below quorum"
        );
        return Ok(refusal("insufficient quorum evidence"));
    }

    let _guard = state.commit_guard.lock().await;

    let count = state.blocks.block_count().map_err(RpcError::from)?;
    if block.idx < count {
        // Already past this height. Same block: idempotent ack.
        let stored = state.blocks.get_block(block.idx).map_err(RpcError::from)?;
        return Ok(match stored {
            Some(existing) if block_hash(&existing) == hash => CommitResponse {
                committed: true,
                height: Some(block.idx),
                reason: None,
            },
            _ => refusal("conflicting block at committed height"),
        });
    }
    if block.idx > count {
        // Missing predecessors; the heartbeat sync will fetch them with
        // their own evidence trail.
        return Ok(refusal("node is behind this block"));
    }

    // Continuity, signature, and structure are re-checked at the append
    // point. Content sanity is not: quorum already vouched for the cids and
    // this node may not hold every replicated message.
    let view = StoreChainView::new(state.blocks.as_ref(), state.messages.as_ref());
    let validator = ProposalValidator::new(state.settings.max_block_cids);
    if let Err(reason) = validator.validate_historical(&view, block) {
        debug!(height = block.idx, %hash, reason = reason.code(), "commit block failed validation");
        return Ok(refusal(reason.code()));
    }

    let height = state.blocks.append_block(block).map_err(RpcError::from)?;
    info!(
        height,
        %hash,
        cids = block.cids.len(),
        proposer = %block.proposer,
        "committed block"
    );

    for cid in &block.cids {
        match state.messages.mark_committed(cid) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                // Replica gap; the integrity pass repairs the flag once the
                // message arrives.
                debug!(%cid, "committed cid has no local message row");
                continue;
            }
            Err(e) => return Err(RpcError::from(e)),
        }
        if let Ok(Some(record)) = state.messages.get_message(cid) {
            state
                .push
                .publish_committed(
                    &record.recipient,
                    *cid,
                    record.sender.clone(),
                    record.root_id,
                    record.session_id,
                    height,
                    hash,
                )
                .await;
        }
    }

    Ok(CommitResponse {
        committed: true,
        height: Some(height),
        reason: None,
    })
}

fn refusal(reason: &str) -> CommitResponse {
    CommitResponse {
        committed: false,
        height: None,
        reason: Some(reason.to_string()),
    }
}
