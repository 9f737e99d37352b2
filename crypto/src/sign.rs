//! Ed25519 signing and verification.
//!
//! Every signature in the protocol goes through these two functions:
//! delivery authorizations, peer registrations, block proposals, quorum
//! votes, and push-socket tickets.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use relaynet_types::{PrivateKey, PublicKey, Signature};

/// Sign `message` with `private_key`.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Check `signature` over `message` against `public_key`.
///
/// Verification is strict: non-canonical and small-order signatures are
/// rejected along with plain forgeries. A malformed public key never
/// panics, it simply fails.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &sig).is_ok()
}
