//! LMDB database integrity checks.
//!
//! Run on startup, before the node begins serving. Block appends and
//! committed-flag flips are separate write transactions, so a crash between
//! them can leave a block whose messages still read as uncommitted. The
//! repair pass closes that window by re-deriving the flags from the chain.

use std::path::Path;

use relaynet_types::Cid;
use relaynet_store::{MessageStore, StoreError};

use crate::block::{decode_block, LmdbBlockStore};
use crate::message::{decode_record, LmdbMessageStore};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub blocks_checked: u64,
    pub messages_checked: u64,
    /// Message flags re-derived from committed blocks.
    pub flags_repaired: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected. Repairs alone do not
    /// make a store unhealthy.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check the chain and message databases, repairing commit flags.
///
/// Three passes:
/// 1. heights `0..count` must all decode (dense chain),
/// 2. every message record must decode,
/// 3. every CID referenced by a stored block must exist and read as
///    delivered and committed; stale flags are flipped back on.
///
/// Shape problems are recorded in the report rather than causing a hard
/// error; only backend failures abort the check.
pub fn check_and_repair(
    blocks: &LmdbBlockStore,
    messages: &LmdbMessageStore,
) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport {
        blocks_checked: 0,
        messages_checked: 0,
        flags_repaired: 0,
        errors: Vec::new(),
    };

    let mut chained_cids: Vec<(u64, Cid)> = Vec::new();
    {
        let rtxn = blocks.env.read_txn().map_err(LmdbError::from)?;
        let count = blocks.blocks_db.len(&rtxn).map_err(LmdbError::from)?;
        for idx in 0..count {
            let val = blocks
                .blocks_db
                .get(&rtxn, &idx.to_be_bytes())
                .map_err(LmdbError::from)?;
            match val {
                Some(bytes) => match decode_block(bytes) {
                    Ok(block) => {
                        report.blocks_checked += 1;
                        for cid in &block.cids {
                            chained_cids.push((idx, *cid));
                        }
                    }
                    Err(e) => {
                        report
                            .errors
                            .push(format!("block at height {idx} does not decode: {e}"));
                    }
                },
                None => {
                    report.errors.push(format!("missing block at height {idx}"));
                }
            }
        }
    }

    {
        let rtxn = messages.env.read_txn().map_err(LmdbError::from)?;
        let iter = messages.messages_db.iter(&rtxn).map_err(LmdbError::from)?;
        for entry in iter {
            let (key, val) = entry.map_err(LmdbError::from)?;
            match decode_record(val) {
                Ok(_) => report.messages_checked += 1,
                Err(e) => {
                    report.errors.push(format!(
                        "message {} does not decode: {e}",
                        hex::encode(key)
                    ));
                }
            }
        }
    }

    for (height, cid) in chained_cids {
        match messages.get_message(&cid)? {
            Some(record) => {
                if !record.delivered || !record.committed {
                    let changed = messages.update_record(&cid, |rec| {
                        let stale = !rec.delivered || !rec.committed;
                        rec.delivered = true;
                        rec.committed = true;
                        stale
                    })?;
                    if changed {
                        report.flags_repaired += 1;
                    }
                }
            }
            None => {
                report.errors.push(format!(
                    "block at height {height} references unknown message {cid}"
                ));
            }
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(()); // Fresh start
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use relaynet_store::{BlockStore, MessageRecord, MessageStore};
    use relaynet_types::{Block, BlockHash, MerkleRoot, RootId, SessionId, SignerAddress, Signature, Timestamp};

    fn record(cid_byte: u8) -> MessageRecord {
        MessageRecord {
            cid: Cid::new([cid_byte; 32]),
            root_id: RootId::new([0xEE; 32]),
            session_id: SessionId::new([0xDD; 32]),
            sender: SignerAddress::new("rn_alice"),
            recipient: SignerAddress::new("rn_bob"),
            timestamp: Timestamp::new(100),
            delivered: false,
            committed: false,
        }
    }

    fn block_with(idx: u64, cids: Vec<Cid>) -> Block {
        Block {
            idx,
            previous_hash: BlockHash::ZERO,
            merkle_root: MerkleRoot::new([idx as u8; 32]),
            cids,
            proposer: SignerAddress::new("rn_proposer"),
            timestamp: 1_700_000_000,
            signature: Signature([0u8; 64]),
        }
    }

    #[test]
    fn check_data_dir_fresh_path() {
        let result = check_data_dir(Path::new("/tmp/relaynet_test_nonexistent_12345"));
        assert!(result.is_ok());
    }

    #[test]
    fn empty_store_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(&dir.path().join("db")).unwrap();
        let report = check_and_repair(&env.blocks, &env.messages).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.blocks_checked, 0);
        assert_eq!(report.flags_repaired, 0);
    }

    #[test]
    fn repairs_stale_commit_flags() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(&dir.path().join("db")).unwrap();

        let rec = record(1);
        env.messages.put_message(&rec).unwrap();
        env.messages.mark_delivered(&rec.cid).unwrap();
        // Block lands but the commit flag flip never happened.
        env.blocks
            .append_block(&block_with(0, vec![rec.cid]))
            .unwrap();

        let report = check_and_repair(&env.blocks, &env.messages).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.flags_repaired, 1);
        assert!(env.messages.get_message(&rec.cid).unwrap().unwrap().committed);

        // Second run finds nothing left to do.
        let again = check_and_repair(&env.blocks, &env.messages).unwrap();
        assert_eq!(again.flags_repaired, 0);
    }

    #[test]
    fn reports_unknown_block_cid() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(&dir.path().join("db")).unwrap();
        env.blocks
            .append_block(&block_with(0, vec![Cid::new([9u8; 32])]))
            .unwrap();

        let report = check_and_repair(&env.blocks, &env.messages).unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("unknown message"));
    }
}
