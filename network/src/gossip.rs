//! Cluster-wide fan-outs: proposals, commits, registration gossip.
//!
//! Everything here is flood-based and best-effort. A peer that cannot be
//! reached simply contributes no vote, misses the commit (it will catch up
//! over heartbeat sync), or stays unaware of a new peer until the next
//! gossip round. Successful contact refreshes the peer's `last_seen`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use relaynet_messages::{CommitRequest, RegisterPeerRequest, VoteResponse};
use relaynet_types::{Block, Timestamp};

use crate::{NodeClient, PeerRegistry};

/// Outcome of a fan-out attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastResult {
    /// Peers that answered.
    pub sent: usize,
    /// Peers that errored or timed out.
    pub failed: usize,
}

#[derive(Clone)]
pub struct Gossip {
    client: NodeClient,
    registry: Arc<PeerRegistry>,
}

impl Gossip {
    pub fn new(client: NodeClient, registry: Arc<PeerRegistry>) -> Self {
        Self { client, registry }
    }

    /// Send a proposal to every online peer and collect the votes that came
    /// back within `timeout`. Unreachable peers contribute no vote.
    pub async fn broadcast_proposal(&self, block: &Block, timeout: Duration) -> Vec<VoteResponse> {
        let peers = self.registry.online_urls(Timestamp::now()).await;
        let calls = peers
            .iter()
            .map(|url| self.client.send_proposal(url, block, timeout));

        let mut votes = Vec::with_capacity(peers.len());
        for (url, result) in peers.iter().zip(join_all(calls).await) {
            match result {
                Ok(vote) => {
                    self.registry.touch(url, Timestamp::now()).await;
                    votes.push(vote);
                }
                Err(e) => {
                    tracing::debug!(peer = %url, error = %e, "no vote from peer");
                }
            }
        }
        votes
    }

    /// Fan a committed block and its evidence out to every online peer.
    pub async fn broadcast_commit(&self, request: &CommitRequest) -> BroadcastResult {
        let peers = self.registry.online_urls(Timestamp::now()).await;
        let calls = peers
            .iter()
            .map(|url| self.client.send_commit(url, request));

        let mut result = BroadcastResult::default();
        for (url, outcome) in peers.iter().zip(join_all(calls).await) {
            match outcome {
                Ok(_) => {
                    self.registry.touch(url, Timestamp::now()).await;
                    result.sent += 1;
                }
                Err(e) => {
                    tracing::debug!(peer = %url, error = %e, "commit broadcast failed");
                    result.failed += 1;
                }
            }
        }
        result
    }

    /// Introduce this node to each given peer, best effort. Used during
    /// bootstrap after adopting a learned peer list.
    pub async fn fan_out_register(
        &self,
        urls: &[String],
        request: &RegisterPeerRequest,
    ) -> BroadcastResult {
        let calls = urls
            .iter()
            .map(|url| self.client.register_peer(url, request));

        let mut result = BroadcastResult::default();
        for (url, outcome) in urls.iter().zip(join_all(calls).await) {
            match outcome {
                Ok(_) => {
                    self.registry.touch(url, Timestamp::now()).await;
                    result.sent += 1;
                }
                Err(e) => {
                    tracing::debug!(peer = %url, error = %e, "registration gossip failed");
                    result.failed += 1;
                }
            }
        }
        result
    }
}
