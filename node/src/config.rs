//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use relaynet_rpc::RpcSettings;

use crate::NodeError;

/// Configuration for a RelayNet node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default so a
/// single-node setup runs from an empty file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for LMDB storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Path to the node's Ed25519 secret key file (hex). Generated and
    /// persisted on first run if missing.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// HTTP RPC port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// WebSocket push port.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Base URL peers can reach this node at, e.g. "http://10.0.0.5:8470".
    /// Required for registering with other nodes; a node without one can
    /// still serve clients.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Node to register with on startup.
    #[serde(default)]
    pub bootstrap_url: Option<String>,

    /// Seconds between block proposal attempts.
    #[serde(default = "default_proposal_interval_secs")]
    pub proposal_interval_secs: u64,

    /// Maximum number of CIDs bundled into one block.
    #[serde(default = "default_max_block_cids")]
    pub max_block_cids: usize,

    /// How many peers each message is replicated to.
    #[serde(default = "default_redundancy")]
    pub redundancy: usize,

    /// Replica acks required before a message counts as delivered.
    #[serde(default = "default_min_delivery_acks")]
    pub min_delivery_acks: usize,

    /// Majority threshold in basis points (5100 = 51%).
    #[serde(default = "default_majority_bps")]
    pub majority_bps: u32,

    /// Whether stale peers still count toward the voting population.
    #[serde(default)]
    pub quorum_counts_stale: bool,

    /// Seconds to wait for peer votes on a proposal.
    #[serde(default = "default_vote_timeout_secs")]
    pub vote_timeout_secs: u64,

    /// Per-peer timeout for replica pushes.
    #[serde(default = "default_replicate_timeout_secs")]
    pub replicate_timeout_secs: u64,

    /// Seconds between heartbeat rounds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds of silence after which a peer no longer counts as online.
    #[serde(default = "default_peer_stale_after_secs")]
    pub peer_stale_after_secs: u64,

    /// Seconds of silence after which a peer is dropped entirely.
    #[serde(default = "default_peer_prune_after_secs")]
    pub peer_prune_after_secs: u64,

    /// Width of a conversation session window in seconds.
    #[serde(default = "default_session_window_secs")]
    pub session_window_secs: u64,

    /// Maximum accepted payload size in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Allowed clock skew for signed timestamps (registration, tickets).
    #[serde(default = "default_auth_skew_secs")]
    pub auth_skew_secs: u64,

    /// Whether peer registration must carry a valid signature.
    #[serde(default)]
    pub require_peer_auth: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./relaynet_data")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("./relaynet_data/node_key")
}

fn default_rpc_port() -> u16 {
    8470
}

fn default_ws_port() -> u16 {
    8471
}

fn default_proposal_interval_secs() -> u64 {
    20
}

fn default_max_block_cids() -> usize {
    20
}

fn default_redundancy() -> usize {
    3
}

fn default_min_delivery_acks() -> usize {
    1
}

fn default_majority_bps() -> u32 {
    5100
}

fn default_vote_timeout_secs() -> u64 {
    15
}

fn default_replicate_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_peer_stale_after_secs() -> u64 {
    300
}

fn default_peer_prune_after_secs() -> u64 {
    3600
}

fn default_session_window_secs() -> u64 {
    3600
}

fn default_max_payload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_auth_skew_secs() -> u64 {
    300
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key_file: default_key_file(),
            rpc_port: default_rpc_port(),
            ws_port: default_ws_port(),
            public_url: None,
            bootstrap_url: None,
            proposal_interval_secs: default_proposal_interval_secs(),
            max_block_cids: default_max_block_cids(),
            redundancy: default_redundancy(),
            min_delivery_acks: default_min_delivery_acks(),
            majority_bps: default_majority_bps(),
            quorum_counts_stale: false,
            vote_timeout_secs: default_vote_timeout_secs(),
            replicate_timeout_secs: default_replicate_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            peer_stale_after_secs: default_peer_stale_after_secs(),
            peer_prune_after_secs: default_peer_prune_after_secs(),
            session_window_secs: default_session_window_secs(),
            max_payload_bytes: default_max_payload_bytes(),
            auth_skew_secs: default_auth_skew_secs(),
            require_peer_auth: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string. Missing keys fall back to
    /// their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, NodeError> {
        toml::from_str(contents).map_err(|e| NodeError::Config(format!("parse config: {e}")))
    }

    /// Serialize to a TOML string (for writing an example config).
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// The settings snapshot handed to the RPC layer.
    pub fn rpc_settings(&self) -> RpcSettings {
        RpcSettings {
            max_payload_bytes: self.max_payload_bytes,
            max_block_cids: self.max_block_cids,
            majority_bps: self.majority_bps,
            quorum_counts_stale: self.quorum_counts_stale,
            require_peer_auth: self.require_peer_auth,
            auth_skew_secs: self.auth_skew_secs,
            session_window_secs: self.session_window_secs,
            ..RpcSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.rpc_port, config.rpc_port);
        assert_eq!(parsed.proposal_interval_secs, config.proposal_interval_secs);
        assert_eq!(parsed.majority_bps, config.majority_bps);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rpc_port, 8470);
        assert_eq!(config.ws_port, 8471);
        assert_eq!(config.redundancy, 3);
        assert_eq!(config.min_delivery_acks, 1);
        assert_eq!(config.majority_bps, 5100);
        assert!(!config.quorum_counts_stale);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            rpc_port = 9999
            redundancy = 5
            bootstrap_url = "http://seed.example.com:8470"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.redundancy, 5);
        assert_eq!(
            config.bootstrap_url.as_deref(),
            Some("http://seed.example.com:8470")
        );
        assert_eq!(config.proposal_interval_secs, 20); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/relaynet.toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn rpc_settings_mirror_the_config() {
        let mut config = NodeConfig::default();
        config.max_payload_bytes = 1024;
        config.require_peer_auth = true;
        let settings = config.rpc_settings();
        assert_eq!(settings.max_payload_bytes, 1024);
        assert!(settings.require_peer_auth);
        assert_eq!(settings.majority_bps, 5100);
    }
}
