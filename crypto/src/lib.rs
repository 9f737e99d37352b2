//! Cryptographic primitives for the RelayNet protocol.
//!
//! Everything content-addressed or signed goes through this crate:
//! Blake2b-256 hashing, Ed25519 keys and signatures, checksummed signer
//! addresses, cid derivation, conversation/session identifiers, Merkle
//! roots, and block hashing.

pub mod address;
pub mod block;
pub mod content;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod sign;

pub use address::{decode_address, derive_address, validate_address};
pub use block::{block_hash, sign_block, verify_block_signature};
pub use content::{cid_of, root_id, session_id};
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use merkle::merkle_root;
pub use sign::{sign_message, verify_signature};
