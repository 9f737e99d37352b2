//! LMDB implementation of MessageStore.
//!
//! Three databases back it:
//! - `messages`:   cid (32 bytes) → bincode [`MessageRecord`]
//! - `payloads`:   cid (32 bytes) → raw encrypted bytes
//! - `conv_index`: root_id ‖ timestamp (BE) ‖ cid → cid, so conversation
//!   pages are a single range scan in time order.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use relaynet_store::{MessageRecord, MessageStore, StoreError};
use relaynet_types::{Cid, RootId, SignerAddress};

use crate::LmdbError;

pub struct LmdbMessageStore {
    pub(crate) env: Arc<Env>,
    pub(crate) messages_db: Database<Bytes, Bytes>,
    pub(crate) payloads_db: Database<Bytes, Bytes>,
    pub(crate) conv_db: Database<Bytes, Bytes>,
}

/// Build a conversation index key: root_id ‖ timestamp (BE) ‖ cid.
///
/// Big-endian timestamps make byte order equal time order within one root.
fn conv_key(root_id: &RootId, timestamp: u64, cid: &[u8; 32]) -> [u8; 72] {
    let mut key = [0u8; 72];
    key[..32].copy_from_slice(root_id.as_bytes());
    key[32..40].copy_from_slice(&timestamp.to_be_bytes());
    key[40..].copy_from_slice(cid);
    key
}

pub(crate) fn decode_record(bytes: &[u8]) -> Result<MessageRecord, LmdbError> {
    bincode::deserialize(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn encode_record(record: &MessageRecord) -> Result<Vec<u8>, LmdbError> {
    bincode::serialize(record).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl LmdbMessageStore {
    /// Read-modify-write one record inside a single write transaction.
    /// Returns `Ok(true)` when `mutate` changed the record.
    pub(crate) fn update_record(
        &self,
        cid: &Cid,
        mutate: impl FnOnce(&mut MessageRecord) -> bool,
    ) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let bytes = self
            .messages_db
            .get(&wtxn, cid.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("message {cid}")))?;
        let mut record = decode_record(bytes)?;
        let changed = mutate(&mut record);
        if changed {
            self.messages_db
                .put(&mut wtxn, cid.as_bytes(), &encode_record(&record)?)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(changed)
    }
}

impl MessageStore for LmdbMessageStore {
    fn put_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existing = self
            .messages_db
            .get(&wtxn, record.cid.as_bytes())
            .map_err(LmdbError::from)?;
        if existing.is_some() {
            return Err(StoreError::Duplicate(format!("message {}", record.cid)));
        }
        self.messages_db
            .put(&mut wtxn, record.cid.as_bytes(), &encode_record(record)?)
            .map_err(LmdbError::from)?;
        let key = conv_key(
            &record.root_id,
            record.timestamp.as_secs(),
            record.cid.as_bytes(),
        );
        self.conv_db
            .put(&mut wtxn, &key, record.cid.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_message(&self, cid: &Cid) -> Result<Option<MessageRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .messages_db
            .get(&rtxn, cid.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(decode_record(bytes)?)),
            None => Ok(None),
        }
    }

    fn put_payload(&self, cid: &Cid, payload: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.payloads_db
            .put(&mut wtxn, cid.as_bytes(), payload)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_payload(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .payloads_db
            .get(&rtxn, cid.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(|bytes| bytes.to_vec()))
    }

    fn mark_delivered(&self, cid: &Cid) -> Result<bool, StoreError> {
        self.update_record(cid, |record| {
            if record.delivered {
                false
            } else {
                record.delivered = true;
                true
            }
        })
    }

    fn mark_committed(&self, cid: &Cid) -> Result<bool, StoreError> {
        self.update_record(cid, |record| {
            if record.committed {
                false
            } else {
                record.committed = true;
                true
            }
        })
    }

    fn pending_cids(&self, limit: usize) -> Result<Vec<Cid>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.messages_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut pending: Vec<(u64, Cid)> = Vec::new();
        for entry in iter {
            let (_, val) = entry.map_err(LmdbError::from)?;
            let record = decode_record(val)?;
            if record.delivered && !record.committed {
                pending.push((record.timestamp.as_secs(), record.cid));
            }
        }
        pending.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        pending.truncate(limit);
        Ok(pending.into_iter().map(|(_, cid)| cid).collect())
    }

    fn messages_for_recipient(
        &self,
        recipient: &SignerAddress,
        since: Option<u64>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.messages_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut matches: Vec<MessageRecord> = Vec::new();
        for entry in iter {
            let (_, val) = entry.map_err(LmdbError::from)?;
            let record = decode_record(val)?;
            if &record.recipient != recipient {
                continue;
            }
            if let Some(since) = since {
                if record.timestamp.as_secs() <= since {
                    continue;
                }
            }
            matches.push(record);
        }
        matches.sort_unstable_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.cid.cmp(&a.cid))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    fn conversation_page(
        &self,
        root_id: &RootId,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let lower = conv_key(root_id, 0, &[0u8; 32]);
        let mut records = Vec::new();
        // Upper bound: exclusive at `before` cuts off every key whose
        // timestamp is >= before; otherwise include the full root range.
        let iter = match before {
            Some(before) => {
                let upper = conv_key(root_id, before, &[0u8; 32]);
                let range = (Bound::Included(&lower[..]), Bound::Excluded(&upper[..]));
                self.conv_db.rev_range(&rtxn, &range).map_err(LmdbError::from)?
            }
            None => {
                let upper = conv_key(root_id, u64::MAX, &[0xFF; 32]);
                let range = (Bound::Included(&lower[..]), Bound::Included(&upper[..]));
                self.conv_db.rev_range(&rtxn, &range).map_err(LmdbError::from)?
            }
        };
        for entry in iter {
            if records.len() >= limit {
                break;
            }
            let (_, cid_bytes) = entry.map_err(LmdbError::from)?;
            let val = self
                .messages_db
                .get(&rtxn, cid_bytes)
                .map_err(LmdbError::from)?;
            if let Some(bytes) = val {
                records.push(decode_record(bytes)?);
            }
        }
        Ok(records)
    }

    fn message_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.messages_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
