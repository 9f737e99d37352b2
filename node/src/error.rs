//! Error types for node orchestration.

use thiserror::Error;

/// Errors from node startup, shutdown, and the background loops.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("store error: {0}")]
    Store(#[from] relaynet_store::StoreError),

    #[error("storage backend error: {0}")]
    Lmdb(#[from] relaynet_store_lmdb::LmdbError),

    #[error("network error: {0}")]
    Network(#[from] relaynet_network::NetworkError),

    #[error("rpc error: {0}")]
    Rpc(#[from] relaynet_rpc::RpcError),

    #[error("websocket server error: {0}")]
    WebSocket(String),

    #[error("chain integrity error: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
