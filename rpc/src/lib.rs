//! HTTP API for the RelayNet node.
//!
//! Serves three audiences on one port:
//! - clients: message delivery, history queries, payload fetch
//! - peers: registration, replication pushes, heartbeat pings
//! - consensus: block proposals and quorum-backed commits
//!
//! The commit path (`chain::apply_committed_block`) is shared with the
//! node's own proposer so local and remote commits follow identical rules.

pub mod chain;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use chain::{apply_committed_block, local_quorum_threshold, StoreChainView};
pub use error::RpcError;
pub use server::{build_router, RpcServer};
pub use state::{AppState, RpcSettings};
