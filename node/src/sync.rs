//! Chain catch-up from a taller peer.
//!
//! When a heartbeat learns that a peer's chain is longer than ours, we pull
//! its blocks page by page from our own height and replay them through the
//! same validation the live commit path uses, minus vote evidence — the
//! chain itself carries none. Content sanity is also skipped: the messages
//! in historical blocks may be replicated elsewhere.

use relaynet_consensus::ProposalValidator;
use relaynet_network::NodeClient;
use relaynet_rpc::{AppState, StoreChainView};
use relaynet_store::{BlockStore, MessageStore, StoreError};
use relaynet_types::Block;
use tracing::{debug, info, warn};

use crate::NodeError;

/// How many blocks to request per page while catching up.
pub const SYNC_PAGE: usize = 100;

/// Validate and append a batch of blocks fetched from a peer.
///
/// Blocks must arrive in ascending order. Already-held heights are skipped;
/// the first block that fails validation stops the batch (the rest would
/// fail continuity anyway). Returns how many blocks were appended.
///
/// Holds the commit guard so a concurrent proposal or peer commit cannot
/// interleave between validation and append.
pub async fn apply_blocks(state: &AppState, blocks: &[Block]) -> Result<usize, NodeError> {
    let _guard = state.commit_guard.lock().await;

    let validator = ProposalValidator::new(state.settings.max_block_cids);
    let view = StoreChainView::new(state.blocks.as_ref(), state.messages.as_ref());
    let mut applied = 0usize;

    for block in blocks {
        let held = state.blocks.block_count()?;
        if block.idx < held {
            debug!(height = block.idx, "skipping block we already hold");
            continue;
        }

        if let Err(reason) = validator.validate_historical(&view, block) {
            warn!(
                height = block.idx,
                reason = reason.code(),
                "synced block failed validation, stopping catch-up"
            );
            break;
        }

        state.blocks.append_block(block)?;
        for cid in &block.cids {
            match state.messages.mark_committed(cid) {
                Ok(_) => {}
                // We may never have held a replica of this message.
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        applied += 1;
    }

    Ok(applied)
}

/// Pull the peer's chain from our current height until it has nothing more
/// to give. Returns the total number of blocks applied.
pub async fn sync_from_peer(
    state: &AppState,
    client: &NodeClient,
    peer: &str,
) -> Result<usize, NodeError> {
    let mut total = 0usize;

    loop {
        let from = state.blocks.block_count()?;
        let page = client.blocks_from(peer, from, SYNC_PAGE).await?;
        if page.blocks.is_empty() {
            break;
        }

        let applied = apply_blocks(state, &page.blocks).await?;
        total += applied;

        // A short or partially-rejected page means the peer has nothing
        // more we can use.
        if applied < page.blocks.len() {
            break;
        }
    }

    if total > 0 {
        info!(peer, blocks = total, "chain catch-up applied blocks");
    }
    Ok(total)
}
