//! Ed25519 key generation.
//!
//! A [`PrivateKey`] holds the 32-byte dalek seed, which is exactly what the
//! node persists to its key file: seed in, same identity out, forever.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use relaynet_types::{KeyPair, PrivateKey, PublicKey};

fn expand(signing_key: &SigningKey) -> KeyPair {
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Generate a new key pair from the OS random source.
pub fn generate_keypair() -> KeyPair {
    expand(&SigningKey::generate(&mut OsRng))
}

/// Deterministically derive a key pair from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    expand(&SigningKey::from_bytes(seed))
}

/// Rebuild the full pair around an existing private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    keypair_from_seed(&private.0)
}

/// The public half of a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    PublicKey(SigningKey::from_bytes(&private.0).verifying_key().to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_nonzero_keys() {
        let kp = generate_keypair();
        assert_ne!(kp.public.0, [0u8; 32]);
        assert_ne!(kp.private.0, [0u8; 32]);
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let kp1 = keypair_from_seed(&[42u8; 32]);
        let kp2 = keypair_from_seed(&[42u8; 32]);
        assert_eq!(kp1.public.0, kp2.public.0);
        assert_eq!(kp1.private.0, kp2.private.0);
        assert_ne!(kp1.public.0, keypair_from_seed(&[43u8; 32]).public.0);
    }

    #[test]
    fn persisted_private_key_restores_the_identity() {
        // The node key file stores private.0; reloading it must yield the
        // same public key the node announced before the restart.
        let original = generate_keypair();
        let reloaded = keypair_from_private(PrivateKey(original.private.0));
        assert_eq!(original.public.0, reloaded.public.0);
    }

    #[test]
    fn public_from_private_matches_the_pair() {
        let kp = keypair_from_seed(&[7u8; 32]);
        assert_eq!(public_from_private(&kp.private).0, kp.public.0);
    }
}
