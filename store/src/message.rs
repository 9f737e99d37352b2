//! Message metadata and payload storage trait.

use crate::StoreError;
use relaynet_types::{Cid, RootId, SessionId, SignerAddress, Timestamp};
use serde::{Deserialize, Serialize};

/// One relayed message's metadata row.
///
/// The encrypted payload is stored separately, keyed by the same cid, so
/// metadata scans never drag payload bytes through memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub cid: Cid,
    pub sender: SignerAddress,
    pub recipient: SignerAddress,
    pub timestamp: Timestamp,
    pub root_id: RootId,
    pub session_id: SessionId,
    /// Set once enough replicas acknowledged storage. Monotonic.
    pub delivered: bool,
    /// Set once a committed block contains this cid. Monotonic.
    pub committed: bool,
}

/// Trait for message metadata and payload persistence.
///
/// Flag updates are atomic per row and monotonic: `delivered` and
/// `committed` only ever flip false → true, and flipping an already-set
/// flag is a no-op.
pub trait MessageStore: Send + Sync {
    /// Insert a new message row. Returns [`StoreError::Duplicate`] if the
    /// cid already exists; the stored row is left untouched in that case.
    fn put_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Fetch a message row by cid.
    fn get_message(&self, cid: &Cid) -> Result<Option<MessageRecord>, StoreError>;

    /// Store the encrypted payload for a cid. Overwriting with identical
    /// bytes is harmless since the cid pins the content.
    fn put_payload(&self, cid: &Cid, payload: &[u8]) -> Result<(), StoreError>;

    /// Fetch the encrypted payload for a cid.
    fn get_payload(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError>;

    /// Flip the delivered flag. Returns `true` if the flag changed, `false`
    /// if it was already set. [`StoreError::NotFound`] if the row is missing.
    fn mark_delivered(&self, cid: &Cid) -> Result<bool, StoreError>;

    /// Flip the committed flag. Same contract as [`Self::mark_delivered`].
    fn mark_committed(&self, cid: &Cid) -> Result<bool, StoreError>;

    /// Cids that are delivered but not yet committed, oldest first, capped
    /// at `limit`. This is the block proposer's work queue.
    fn pending_cids(&self, limit: usize) -> Result<Vec<Cid>, StoreError>;

    /// Message rows addressed to a recipient, newest first. `since` filters
    /// to rows with a strictly later timestamp.
    fn messages_for_recipient(
        &self,
        recipient: &SignerAddress,
        since: Option<u64>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// One page of a conversation, newest first. `before` filters to rows
    /// with a strictly earlier timestamp.
    fn conversation_page(
        &self,
        root_id: &RootId,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Total number of message rows.
    fn message_count(&self) -> Result<u64, StoreError>;
}
