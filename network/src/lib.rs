//! P2P networking for RelayNet.
//!
//! Nodes talk to each other over plain HTTP/JSON: registration, health
//! pings, replica pushes, proposals and commits all go through the same
//! [`NodeClient`]. The [`PeerRegistry`] is the single source of truth for
//! who exists and who is fresh enough to count; the [`ReplicationEngine`]
//! and [`Gossip`] fan work out across it.

pub mod client;
pub mod error;
pub mod gossip;
pub mod registry;
pub mod replication;
pub mod url;

pub use client::NodeClient;
pub use error::NetworkError;
pub use gossip::{BroadcastResult, Gossip};
pub use registry::{PeerEntry, PeerRegistry};
pub use replication::{ReplicationEngine, ReplicationOutcome};
pub use url::canonical_peer_url;
