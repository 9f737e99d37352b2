//! RelayNet full node — orchestration of every subsystem.
//!
//! The node is the central coordinator that:
//! - Opens and heals the LMDB store
//! - Loads (or mints) the node's signing identity
//! - Serves the HTTP RPC and WebSocket push endpoints
//! - Runs the proposal loop that bundles delivered messages into blocks
//! - Keeps the peer registry fresh via heartbeats and catch-up sync
//! - Registers with a bootstrap peer on startup

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod logging;
pub mod node;
pub mod proposer;
pub mod shutdown;
pub mod sync;

pub use config::NodeConfig;
pub use error::NodeError;
pub use heartbeat::HeartbeatContext;
pub use identity::load_or_generate_keypair;
pub use logging::{init_logging, LogFormat};
pub use node::RelayNode;
pub use proposer::{ProposalOutcome, Proposer};
pub use shutdown::{drain_tasks, ShutdownController};
pub use sync::{apply_blocks, sync_from_peer};
