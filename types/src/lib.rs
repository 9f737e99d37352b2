//! Fundamental types for the RelayNet protocol.
//!
//! This crate defines the identifiers and records every other crate speaks
//! in: content identifiers, block and Merkle hashes, conversation ids,
//! signer addresses, key material, timestamps, and the block itself. It has
//! no I/O and no crypto — hashing and signing live in `relaynet-crypto`.

pub mod address;
pub mod block;
pub mod cid;
pub mod conversation;
pub mod error;
pub mod hash;
pub mod keys;
pub mod time;

pub use address::SignerAddress;
pub use block::Block;
pub use cid::Cid;
pub use conversation::{RootId, SessionId};
pub use error::ParseError;
pub use hash::{BlockHash, MerkleRoot};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use time::Timestamp;
