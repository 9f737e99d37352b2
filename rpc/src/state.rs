//! Shared handler state.

use std::sync::Arc;

use relaynet_crypto::derive_address;
use relaynet_network::{PeerRegistry, ReplicationEngine};
use relaynet_store::{BlockStore, MessageStore};
use relaynet_types::{KeyPair, SignerAddress};
use relaynet_websocket::PushState;
use tokio::sync::Mutex;

/// Immutable settings snapshot the handlers read. Taken from the node
/// config at startup; changing any of these requires a restart.
#[derive(Clone, Debug)]
pub struct RpcSettings {
    /// Maximum decoded payload size accepted by deliver/replicate.
    pub max_payload_bytes: usize,
    /// Maximum cids per proposed block.
    pub max_block_cids: usize,
    /// Majority threshold in basis points (5100 = 51%).
    pub majority_bps: u32,
    /// Whether stale peers still count toward the quorum denominator.
    pub quorum_counts_stale: bool,
    /// Require signed registration requests.
    pub require_peer_auth: bool,
    /// Accepted clock skew for signed registrations and push tickets.
    pub auth_skew_secs: u64,
    /// Conversation session window length.
    pub session_window_secs: u64,
    /// Page size cap for `/api/blocks`.
    pub max_blocks_page: usize,
    /// Page size cap for message and conversation queries.
    pub max_messages_page: usize,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: 10 * 1024 * 1024,
            max_block_cids: 20,
            majority_bps: 5100,
            quorum_counts_stale: false,
            require_peer_auth: false,
            auth_skew_secs: 300,
            session_window_secs: 3600,
            max_blocks_page: 500,
            max_messages_page: 200,
        }
    }
}

/// Everything a handler can reach. Cloned per request by axum; all fields
/// are shared handles.
#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<dyn MessageStore>,
    pub blocks: Arc<dyn BlockStore>,
    pub registry: Arc<PeerRegistry>,
    pub replication: Arc<ReplicationEngine>,
    pub push: Arc<PushState>,
    pub keypair: Arc<KeyPair>,
    /// Derived from `keypair` once at startup.
    pub address: SignerAddress,
    pub settings: Arc<RpcSettings>,
    /// Serializes validate-then-append on the commit path. LMDB's single
    /// writer protects each operation; this protects the sequence.
    pub commit_guard: Arc<Mutex<()>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        messages: Arc<dyn MessageStore>,
        blocks: Arc<dyn BlockStore>,
        registry: Arc<PeerRegistry>,
        replication: Arc<ReplicationEngine>,
        push: Arc<PushState>,
        keypair: Arc<KeyPair>,
        settings: RpcSettings,
    ) -> Self {
        let address = derive_address(&keypair.public);
        Self {
            messages,
            blocks,
            registry,
            replication,
            push,
            keypair,
            address,
            settings: Arc::new(settings),
            commit_guard: Arc::new(Mutex::new(())),
        }
    }
}
