//! LMDB storage backend for RelayNet.
//!
//! Implements the `relaynet-store` traits using the `heed` LMDB bindings.
//! All logical stores share one environment; each maps to a named LMDB
//! database. LMDB's MVCC means read transactions never block the single
//! writer, which is the concurrency model the intake and consensus paths
//! rely on.

pub mod block;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod message;
pub mod peer;

pub use block::LmdbBlockStore;
pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use integrity::{check_and_repair, check_data_dir, IntegrityReport};
pub use message::LmdbMessageStore;
pub use peer::LmdbPeerStore;
