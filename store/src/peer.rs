//! Peer persistence trait.
//!
//! The live registry is in memory; this store only mirrors it so a
//! restarted node remembers who it knew. Liveness status is always derived
//! from `last_seen` at read time, never stored.

use crate::StoreError;
use serde::{Deserialize, Serialize};

/// A persisted peer entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPeer {
    pub url: String,
    /// Unix seconds of the last successful contact.
    pub last_seen: u64,
}

pub trait PeerStore: Send + Sync {
    /// Insert or refresh a peer entry.
    fn put_peer(&self, url: &str, last_seen: u64) -> Result<(), StoreError>;

    /// Fetch a peer's last-seen timestamp.
    fn get_peer(&self, url: &str) -> Result<Option<u64>, StoreError>;

    /// Remove a peer entry.
    fn delete_peer(&self, url: &str) -> Result<(), StoreError>;

    /// All persisted peers, in no particular order.
    fn iter_peers(&self) -> Result<Vec<StoredPeer>, StoreError>;

    /// Delete peers last seen strictly before `cutoff_secs`. Returns how
    /// many were removed.
    fn purge_older_than(&self, cutoff_secs: u64) -> Result<usize, StoreError>;
}
