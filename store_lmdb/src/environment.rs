//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{LmdbBlockStore, LmdbError, LmdbMessageStore, LmdbPeerStore};

/// Default maximum size of the memory map (10 GiB). LMDB reserves address
/// space, not disk, so this is an upper bound rather than an allocation.
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

/// Number of named databases the environment holds.
const MAX_DBS: u32 = 8;

/// Current on-disk schema version.
const SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Wraps the LMDB environment and the typed store handles over it.
pub struct LmdbEnvironment {
    pub env: Arc<Env>,
    pub messages: Arc<LmdbMessageStore>,
    pub blocks: Arc<LmdbBlockStore>,
    pub peers: Arc<LmdbPeerStore>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path with the
    /// default map size. The directory is created if missing.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    /// Open or create an LMDB environment with an explicit map size.
    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create data dir {}: {e}", path.display())))?;

        // Safety: the environment directory is owned by this process and is
        // not opened twice — the node holds a single LmdbEnvironment.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let env = Arc::new(env);

        let mut wtxn = env.write_txn()?;
        let messages_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("messages"))?;
        let payloads_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("payloads"))?;
        let conv_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("conv_index"))?;
        let blocks_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("blocks"))?;
        let peers_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("peers"))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("meta"))?;

        match meta_db.get(&wtxn, SCHEMA_VERSION_KEY)? {
            None => {
                meta_db.put(&mut wtxn, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_le_bytes())?;
            }
            Some(bytes) if bytes.len() == 4 => {
                let arr: [u8; 4] = bytes.try_into().expect("checked length");
                let found = u32::from_le_bytes(arr);
                if found > SCHEMA_VERSION {
                    return Err(LmdbError::Heed(format!(
                        "database schema version {found} is newer than supported {SCHEMA_VERSION}"
                    )));
                }
            }
            Some(_) => {
                return Err(LmdbError::Serialization(
                    "schema_version has unexpected size".into(),
                ));
            }
        }
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            messages: Arc::new(LmdbMessageStore {
                env: env.clone(),
                messages_db,
                payloads_db,
                conv_db,
            }),
            blocks: Arc::new(LmdbBlockStore {
                env: env.clone(),
                blocks_db,
            }),
            peers: Arc::new(LmdbPeerStore {
                env: env.clone(),
                peers_db,
            }),
            env,
        })
    }
}
