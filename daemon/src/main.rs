//! RelayNet daemon — entry point for running a relay node.

use clap::Parser;
use relaynet_node::{init_logging, LogFormat, NodeConfig, RelayNode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relaynet-daemon", about = "RelayNet relay node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "RELAYNET_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for message and chain storage.
    #[arg(long, env = "RELAYNET_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to the node's secret key file.
    #[arg(long, env = "RELAYNET_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// HTTP RPC port.
    #[arg(long, env = "RELAYNET_RPC_PORT")]
    rpc_port: Option<u16>,

    /// WebSocket push port.
    #[arg(long, env = "RELAYNET_WS_PORT")]
    ws_port: Option<u16>,

    /// Base URL other nodes can reach this node at.
    #[arg(long, env = "RELAYNET_PUBLIC_URL")]
    public_url: Option<String>,

    /// Peer to register with on startup.
    #[arg(long, env = "RELAYNET_BOOTSTRAP_URL")]
    bootstrap_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "RELAYNET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "RELAYNET_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => NodeConfig::from_toml_file(path)?,
        None => NodeConfig::default(),
    };

    // CLI flags and env vars override the file.
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(key_file) = cli.key_file {
        config.key_file = key_file;
    }
    if let Some(rpc_port) = cli.rpc_port {
        config.rpc_port = rpc_port;
    }
    if let Some(ws_port) = cli.ws_port {
        config.ws_port = ws_port;
    }
    if let Some(public_url) = cli.public_url {
        config.public_url = Some(public_url);
    }
    if let Some(bootstrap_url) = cli.bootstrap_url {
        config.bootstrap_url = Some(bootstrap_url);
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    if let Some(log_format) = cli.log_format {
        config.log_format = log_format;
    }

    init_logging(LogFormat::from_config(&config.log_format), &config.log_level);

    if let Some(ref path) = cli.config {
        tracing::info!(config = %path.display(), "loaded configuration file");
    }

    let mut node = RelayNode::new(config).await?;
    node.start().await?;

    tracing::info!("shutdown signal received, stopping node");
    node.stop().await;

    tracing::info!("RelayNet daemon exited cleanly");
    Ok(())
}
