//! Redundant message replication.
//!
//! Intake persists a message locally, then pushes copies to up to
//! `redundancy` random online peers. One ack is enough to call the message
//! delivered (the payload provably exists somewhere else); replication to
//! the remaining peers still proceeds for redundancy. Peers beyond the
//! first ack failing is logged, never fatal.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use relaynet_messages::ReplicateRequest;
use relaynet_types::Timestamp;

use crate::{NodeClient, PeerRegistry};

/// What a replication fan-out achieved.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplicationOutcome {
    /// Peers the fan-out targeted.
    pub targets: usize,
    /// Peers that acked a copy.
    pub acks: usize,
    /// Whether the ack count satisfies the delivery threshold.
    pub delivered: bool,
}

/// Fan-out replication with bounded retry.
#[derive(Clone)]
pub struct ReplicationEngine {
    client: NodeClient,
    registry: Arc<PeerRegistry>,
    /// Target replica count (R).
    redundancy: usize,
    /// Acks required before the message counts as delivered.
    min_acks: usize,
    /// Per-attempt timeout; each peer gets two attempts.
    attempt_timeout: Duration,
}

impl ReplicationEngine {
    pub fn new(
        client: NodeClient,
        registry: Arc<PeerRegistry>,
        redundancy: usize,
        min_acks: usize,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            redundancy,
            min_acks,
            attempt_timeout,
        }
    }

    /// Replicate one message to up to `redundancy` random online peers,
    /// concurrently, with one retry per peer.
    ///
    /// With zero eligible targets the local copy is the only replica and
    /// the message counts as delivered immediately; a fresh or single-node
    /// network would otherwise never advance its chain.
    pub async fn replicate(&self, request: &ReplicateRequest) -> ReplicationOutcome {
        let targets = self
            .registry
            .random_online(self.redundancy, Timestamp::now())
            .await;

        if targets.is_empty() {
            tracing::debug!(cid = %request.cid, "no replication targets, local copy is the replica");
            return ReplicationOutcome {
                targets: 0,
                acks: 0,
                delivered: true,
            };
        }

        let attempts = targets
            .iter()
            .map(|url| self.replicate_to_peer(url, request));
        let acks = join_all(attempts).await.into_iter().filter(|ok| *ok).count();

        let outcome = ReplicationOutcome {
            targets: targets.len(),
            acks,
            delivered: acks >= self.min_acks,
        };
        tracing::info!(
            cid = %request.cid,
            targets = outcome.targets,
            acks = outcome.acks,
            delivered = outcome.delivered,
            "replication fan-out finished"
        );
        outcome
    }

    /// One peer, two attempts. Refreshes the peer's `last_seen` on ack.
    async fn replicate_to_peer(&self, url: &str, request: &ReplicateRequest) -> bool {
        for attempt in 1..=2u32 {
            match self
                .client
                .replicate(url, request, self.attempt_timeout)
                .await
            {
                Ok(_) => {
                    self.registry.touch(url, Timestamp::now()).await;
                    return true;
                }
                Err(e) => {
                    tracing::debug!(peer = %url, attempt, error = %e, "replica push failed");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaynet_types::{Cid, RootId, SessionId, SignerAddress};

    #[tokio::test]
    async fn zero_targets_counts_local_copy_as_replica() {
        let registry = Arc::new(PeerRegistry::new(None, 300, 3600).unwrap());
        let engine = ReplicationEngine::new(
            NodeClient::new().unwrap(),
            registry,
            3,
            1,
            Duration::from_secs(1),
        );

        let request = ReplicateRequest {
            cid: Cid::new([1u8; 32]),
            payload: "deadbeef".into(),
            sender: SignerAddress::new("rn_alice"),
            recipient: SignerAddress::new("rn_bob"),
            timestamp: 100,
            root_id: RootId::new([2u8; 32]),
            session_id: SessionId::new([3u8; 32]),
        };

        let outcome = engine.replicate(&request).await;
        assert_eq!(outcome.targets, 0);
        assert_eq!(outcome.acks, 0);
        assert!(outcome.delivered);
    }
}
