//! Abstract storage traits for RelayNet.
//!
//! Every storage backend implements these traits; the rest of the codebase
//! depends only on them. The shipped backend is LMDB
//! (`relaynet-store-lmdb`), whose MVCC gives readers that never block the
//! single writer — the durability model the relayer's concurrent intake and
//! consensus paths assume.

pub mod block;
pub mod error;
pub mod message;
pub mod peer;

pub use block::BlockStore;
pub use error::StoreError;
pub use message::{MessageRecord, MessageStore};
pub use peer::{PeerStore, StoredPeer};
