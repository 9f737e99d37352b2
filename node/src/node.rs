//! The RelayNet node — wires storage, consensus, networking and the
//! servers together.
//!
//! Startup order matters: the store opens and heals first, the identity
//! key loads, the peer registry rehydrates from its LMDB mirror, then the
//! servers and background loops come up, and only then does the node
//! announce itself to the network. Shutdown reverses this: signal every
//! task, persist the registry, and wait for the tasks to drain.

use std::sync::Arc;
use std::time::Duration;

use relaynet_crypto::{block_hash, derive_address};
use relaynet_network::{Gossip, NodeClient, PeerRegistry, ReplicationEngine};
use relaynet_rpc::{AppState, RpcServer};
use relaynet_store::{BlockStore, PeerStore};
use relaynet_store_lmdb::{check_and_repair, check_data_dir, LmdbEnvironment};
use relaynet_types::BlockHash;
use relaynet_websocket::{PushState, WebSocketServer};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::heartbeat::{self, HeartbeatContext};
use crate::proposer::Proposer;
use crate::shutdown::{self, ShutdownController};
use crate::{bootstrap, identity, NodeConfig, NodeError};

/// How long `stop` waits for spawned tasks before giving up.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of each recipient's push event channel.
const PUSH_CHANNEL_CAPACITY: usize = 256;

/// A fully wired RelayNet node.
pub struct RelayNode {
    pub config: NodeConfig,
    pub state: AppState,
    pub env: LmdbEnvironment,
    pub client: NodeClient,
    pub gossip: Arc<Gossip>,
    pub shutdown: Arc<ShutdownController>,
    task_handles: Vec<JoinHandle<()>>,
}

impl RelayNode {
    /// Open storage, heal it, load the identity key and wire every
    /// subsystem. Nothing is spawned yet — that happens in [`start`].
    ///
    /// [`start`]: RelayNode::start
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        check_data_dir(&config.data_dir).map_err(NodeError::Integrity)?;
        let env = LmdbEnvironment::open(&config.data_dir)?;

        let report = check_and_repair(&env.blocks, &env.messages)?;
        for problem in &report.errors {
            error!("store integrity: {problem}");
        }
        if !report.is_healthy() {
            return Err(NodeError::Integrity(format!(
                "store failed integrity check with {} error(s)",
                report.errors.len()
            )));
        }
        if report.flags_repaired > 0 {
            info!(
                repaired = report.flags_repaired,
                "repaired commit flags from the chain"
            );
        }
        verify_chain_continuity(env.blocks.as_ref())?;
        info!(
            blocks = report.blocks_checked,
            messages = report.messages_checked,
            "store opened and verified"
        );

        let keypair = Arc::new(identity::load_or_generate_keypair(&config.key_file)?);
        let address = derive_address(&keypair.public);
        info!(%address, "node identity loaded");

        let registry = Arc::new(PeerRegistry::new(
            config.public_url.as_deref(),
            config.peer_stale_after_secs,
            config.peer_prune_after_secs,
        )?);
        let hydrated = registry.hydrate(env.peers.iter_peers()?).await;
        if hydrated > 0 {
            info!(peers = hydrated, "peer registry rehydrated from store");
        }

        let client = NodeClient::new()?;
        let replication = Arc::new(ReplicationEngine::new(
            client.clone(),
            Arc::clone(&registry),
            config.redundancy,
            config.min_delivery_acks,
            Duration::from_secs(config.replicate_timeout_secs),
        ));
        let gossip = Arc::new(Gossip::new(client.clone(), Arc::clone(&registry)));
        let push = Arc::new(PushState::new(
            PUSH_CHANNEL_CAPACITY,
            config.auth_skew_secs,
        ));

        let state = AppState::new(
            env.messages.clone(),
            env.blocks.clone(),
            registry,
            replication,
            push,
            keypair,
            config.rpc_settings(),
        );

        Ok(Self {
            config,
            state,
            env,
            client,
            gossip,
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        })
    }

    /// Spawn the servers and background loops, then block until a
    /// shutdown signal arrives. Call [`stop`](RelayNode::stop) afterwards.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        info!(
            rpc_port = self.config.rpc_port,
            ws_port = self.config.ws_port,
            data_dir = %self.config.data_dir.display(),
            "RelayNet node starting"
        );

        // RPC server
        let rpc_server = RpcServer::new(self.config.rpc_port, self.state.clone());
        let mut rpc_shutdown = self.shutdown.subscribe();
        let rpc_handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = rpc_shutdown.recv() => {
                    info!("RPC server shutting down");
                }
                result = rpc_server.start() => {
                    match result {
                        Ok(()) => info!("RPC server exited"),
                        Err(e) => error!("RPC server error: {e}"),
                    }
                }
            }
        });
        self.task_handles.push(rpc_handle);

        // WebSocket push server
        let ws_server =
            WebSocketServer::with_state(self.config.ws_port, Arc::clone(&self.state.push));
        let mut ws_shutdown = self.shutdown.subscribe();
        let ws_handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = ws_shutdown.recv() => {
                    info!("WebSocket server shutting down");
                }
                result = ws_server.start() => {
                    match result {
                        Ok(()) => info!("WebSocket server exited"),
                        Err(e) => error!("WebSocket server error: {e}"),
                    }
                }
            }
        });
        self.task_handles.push(ws_handle);

        // Proposer loop
        let proposer = Proposer::new(
            self.state.clone(),
            Arc::clone(&self.gossip),
            self.config.proposal_interval_secs,
            self.config.vote_timeout_secs,
        );
        self.task_handles
            .push(tokio::spawn(proposer.run(self.shutdown.subscribe())));

        // Heartbeat loop (also triggers chain catch-up)
        let heartbeat_ctx = HeartbeatContext {
            state: self.state.clone(),
            client: self.client.clone(),
            peers: self.env.peers.clone(),
        };
        self.task_handles.push(tokio::spawn(heartbeat::run(
            heartbeat_ctx,
            self.config.heartbeat_interval_secs,
            self.shutdown.subscribe(),
        )));

        // One-shot bootstrap registration, after the servers are up so
        // peers who learn of us can reach us straight away.
        if self.config.bootstrap_url.is_some() {
            let state = self.state.clone();
            let client = self.client.clone();
            let gossip = Arc::clone(&self.gossip);
            let config = self.config.clone();
            self.task_handles.push(tokio::spawn(async move {
                if let Err(e) =
                    bootstrap::register_with_network(&state, &client, &gossip, &config).await
                {
                    warn!("bootstrap registration failed: {e}");
                }
            }));
        }

        info!("RelayNet node started");
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    pub async fn stop(&mut self) {
        info!("RelayNet node stopping");
        self.shutdown.shutdown();

        // Persist the registry so a restart remembers its peers.
        let mut persisted = 0usize;
        for peer in self.state.registry.snapshot().await {
            match self.env.peers.put_peer(&peer.url, peer.last_seen) {
                Ok(()) => persisted += 1,
                Err(e) => warn!(peer = %peer.url, "failed to persist peer: {e}"),
            }
        }
        if persisted > 0 {
            info!(peers = persisted, "peer registry persisted");
        }

        // Wait for all spawned tasks, with a cap.
        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        if !shutdown::drain_tasks(handles, SHUTDOWN_TIMEOUT).await {
            warn!(
                "shutdown timeout ({SHUTDOWN_TIMEOUT:?}) — some tasks may still be running"
            );
        }

        info!("RelayNet node stopped");
    }
}

/// Walk the whole chain and check the hash links. The store guarantees
/// dense heights; this re-derives each block's hash and compares it with
/// its successor's `previous_hash`, which catches bit rot the cheap decode
/// pass cannot.
fn verify_chain_continuity(blocks: &dyn BlockStore) -> Result<(), NodeError> {
    let count = blocks.block_count().map_err(NodeError::Store)?;
    let mut previous: Option<BlockHash> = None;

    for idx in 0..count {
        let block = blocks
            .get_block(idx)
            .map_err(NodeError::Store)?
            .ok_or_else(|| NodeError::Integrity(format!("missing block at height {idx}")))?;

        match previous {
            None => {
                if !block.is_genesis() {
                    return Err(NodeError::Integrity(
                        "first block does not link to the zero hash".into(),
                    ));
                }
            }
            Some(prev_hash) => {
                if block.previous_hash != prev_hash {
                    return Err(NodeError::Integrity(format!(
                        "hash chain breaks at height {idx}"
                    )));
                }
            }
        }
        previous = Some(block_hash(&block));
    }
    Ok(())
}
