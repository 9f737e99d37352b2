//! Peer liveness loop.
//!
//! Every tick the node pings each known peer's health endpoint. A reply
//! refreshes the peer's `last_seen`; silence past the prune horizon drops
//! the peer from the registry and its LMDB mirror. The reply also carries
//! the peer's chain height — a taller chain triggers a catch-up sync.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use relaynet_network::NodeClient;
use relaynet_rpc::AppState;
use relaynet_store::{BlockStore, PeerStore};
use relaynet_types::Timestamp;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::sync::sync_from_peer;

/// Everything a heartbeat tick needs.
pub struct HeartbeatContext {
    pub state: AppState,
    pub client: NodeClient,
    /// LMDB mirror of the in-memory registry, for restarts.
    pub peers: Arc<dyn PeerStore>,
}

/// Run heartbeat ticks until shutdown.
pub async fn run(ctx: HeartbeatContext, interval_secs: u64, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("heartbeat loop shutting down");
                break;
            }
            _ = interval.tick() => {
                run_tick(&ctx).await;
            }
        }
    }
}

/// One heartbeat round: ping, prune, mirror, maybe sync.
pub async fn run_tick(ctx: &HeartbeatContext) {
    let now = Timestamp::now();
    let urls: Vec<String> = ctx
        .state
        .registry
        .known_peers(now)
        .await
        .into_iter()
        .map(|p| p.url)
        .collect();

    let local_count = match ctx.state.blocks.block_count() {
        Ok(count) => count,
        Err(e) => {
            warn!("heartbeat could not read local chain height: {e}");
            return;
        }
    };

    // Tallest responsive peer whose chain is longer than ours.
    let mut taller: Option<(String, u64)> = None;

    let pings = urls
        .iter()
        .map(|url| async move { ctx.client.health(url).await });
    for (url, result) in urls.iter().zip(join_all(pings).await) {
        match result {
            Ok(health) => {
                ctx.state.registry.touch(url, Timestamp::now()).await;
                if let Some(height) = health.height {
                    let remote_count = height + 1;
                    if remote_count > local_count
                        && taller.as_ref().map_or(true, |(_, best)| remote_count > *best)
                    {
                        taller = Some((url.clone(), remote_count));
                    }
                }
            }
            Err(e) => debug!(peer = %url, "heartbeat ping failed: {e}"),
        }
    }

    // Drop peers silent past the prune horizon, in memory and on disk.
    let removed = ctx.state.registry.prune(Timestamp::now()).await;
    for url in &removed {
        info!(peer = %url, "pruning silent peer");
        if let Err(e) = ctx.peers.delete_peer(url) {
            warn!(peer = %url, "failed to remove pruned peer from store: {e}");
        }
    }

    // Mirror the surviving registry so a restart remembers it.
    for entry in ctx.state.registry.snapshot().await {
        if let Err(e) = ctx.peers.put_peer(&entry.url, entry.last_seen) {
            warn!(peer = %entry.url, "failed to persist peer: {e}");
        }
    }

    if let Some((peer, remote_count)) = taller {
        info!(
            peer = %peer,
            local = local_count,
            remote = remote_count,
            "peer chain is taller, starting catch-up"
        );
        if let Err(e) = sync_from_peer(&ctx.state, &ctx.client, &peer).await {
            warn!(peer = %peer, "chain catch-up failed: {e}");
        }
    }
}
