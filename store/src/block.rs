//! Block chain storage trait.

use crate::StoreError;
use relaynet_types::Block;

/// Trait for the append-only block chain.
///
/// The store enforces dense heights: a block only appends at exactly the
/// current count. Hash continuity against the predecessor is the consensus
/// layer's concern — it owns block hashing — so the store checks shape, not
/// signatures.
pub trait BlockStore: Send + Sync {
    /// Append a block at the next height. Returns the stored height.
    ///
    /// [`StoreError::Duplicate`] if `block.idx` is already occupied,
    /// [`StoreError::Corruption`] if appending would leave a gap.
    fn append_block(&self, block: &Block) -> Result<u64, StoreError>;

    /// The highest stored block, if any.
    fn tip(&self) -> Result<Option<Block>, StoreError>;

    /// Fetch a block by height.
    fn get_block(&self, idx: u64) -> Result<Option<Block>, StoreError>;

    /// Blocks starting at `from`, ascending, at most `count` entries.
    fn blocks_from(&self, from: u64, count: usize) -> Result<Vec<Block>, StoreError>;

    /// Number of stored blocks (the next append height).
    fn block_count(&self) -> Result<u64, StoreError>;
}
