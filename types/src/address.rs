//! Signer address type.
//!
//! Addresses identify message senders, recipients, and proposing nodes.
//! The format (`rn_` + base32 public key + checksum) is produced and decoded
//! by `relaynet-crypto`; this type carries the string form around.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A public-key-derived signer address.
///
/// The address embeds the Ed25519 public key, so any protocol signature can
/// be verified from the address alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerAddress(String);

impl SignerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SignerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SignerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SignerAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
