//! LMDB implementation of BlockStore.
//!
//! Blocks live under their big-endian height, so LMDB key order is chain
//! order and the tip is just the last entry.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use relaynet_store::{BlockStore, StoreError};
use relaynet_types::Block;

use crate::LmdbError;

pub struct LmdbBlockStore {
    pub(crate) env: Arc<Env>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
}

pub(crate) fn decode_block(bytes: &[u8]) -> Result<Block, LmdbError> {
    bincode::deserialize(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn encode_block(block: &Block) -> Result<Vec<u8>, LmdbError> {
    bincode::serialize(block).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl BlockStore for LmdbBlockStore {
    fn append_block(&self, block: &Block) -> Result<u64, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let count = self.blocks_db.len(&wtxn).map_err(LmdbError::from)?;
        if block.idx < count {
            return Err(StoreError::Duplicate(format!(
                "block height {} already occupied",
                block.idx
            )));
        }
        if block.idx > count {
            return Err(StoreError::Corruption(format!(
                "append at height {} would leave a gap (count {})",
                block.idx, count
            )));
        }
        self.blocks_db
            .put(&mut wtxn, &block.idx.to_be_bytes(), &encode_block(block)?)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(block.idx)
    }

    fn tip(&self) -> Result<Option<Block>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let last = self.blocks_db.last(&rtxn).map_err(LmdbError::from)?;
        match last {
            Some((_, bytes)) => Ok(Some(decode_block(bytes)?)),
            None => Ok(None),
        }
    }

    fn get_block(&self, idx: u64) -> Result<Option<Block>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .blocks_db
            .get(&rtxn, &idx.to_be_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(decode_block(bytes)?)),
            None => Ok(None),
        }
    }

    fn blocks_from(&self, from: u64, count: usize) -> Result<Vec<Block>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut blocks = Vec::new();
        for idx in from..from.saturating_add(count as u64) {
            let val = self
                .blocks_db
                .get(&rtxn, &idx.to_be_bytes())
                .map_err(LmdbError::from)?;
            match val {
                Some(bytes) => blocks.push(decode_block(bytes)?),
                None => break,
            }
        }
        Ok(blocks)
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.blocks_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
