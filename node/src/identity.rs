//! Node identity key handling.
//!
//! The node's Ed25519 secret lives in a plain hex file. On first run the
//! key is generated, written with owner-only permissions, and reused on
//! every restart so the node keeps its address across reboots.

use std::path::Path;

use relaynet_crypto::{derive_address, generate_keypair, keypair_from_private};
use relaynet_types::{KeyPair, PrivateKey};

use crate::NodeError;

/// Load the node keypair from `path`, generating and persisting a fresh
/// one if the file does not exist yet.
pub fn load_or_generate_keypair(path: &Path) -> Result<KeyPair, NodeError> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let bytes = hex::decode(contents.trim()).map_err(|e| {
            NodeError::Identity(format!("key file {} is not hex: {e}", path.display()))
        })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            NodeError::Identity(format!(
                "key file {} must hold exactly 32 bytes of hex",
                path.display()
            ))
        })?;
        Ok(keypair_from_private(PrivateKey(seed)))
    } else {
        let keypair = generate_keypair();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, hex::encode(keypair.private.0))?;
        restrict_permissions(path)?;
        tracing::info!(
            path = %path.display(),
            address = %derive_address(&keypair.public),
            "generated new node identity key"
        );
        Ok(keypair)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
