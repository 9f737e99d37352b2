//! Startup registration with the peer network.
//!
//! A node that knows a bootstrap peer announces itself there once at
//! startup, adopts the peer list it gets back, and then announces itself
//! to each newly learned peer so the mesh converges without a directory.
//! Registration is best-effort — a dead bootstrap peer leaves the node
//! running solo.

use relaynet_crypto::sign_message;
use relaynet_messages::{registration_signing_string, RegisterPeerRequest};
use relaynet_network::{Gossip, NodeClient};
use relaynet_rpc::AppState;
use relaynet_types::Timestamp;
use tracing::{debug, info, warn};

use crate::{NodeConfig, NodeError};

/// Build this node's signed registration request. Receivers only check the
/// signature when they require peer auth, but sending it always costs
/// nothing and lets strict peers accept us.
pub fn build_register_request(state: &AppState, public_url: &str) -> RegisterPeerRequest {
    let timestamp = Timestamp::now().as_secs();
    let signature = sign_message(
        registration_signing_string(public_url, timestamp).as_bytes(),
        &state.keypair.private,
    );
    RegisterPeerRequest {
        url: public_url.to_string(),
        address: Some(state.address.clone()),
        timestamp: Some(timestamp),
        signature: Some(signature),
    }
}

/// Register with the configured bootstrap peer and adopt its peer list.
/// Returns how many new peers were learned.
pub async fn register_with_network(
    state: &AppState,
    client: &NodeClient,
    gossip: &Gossip,
    config: &NodeConfig,
) -> Result<usize, NodeError> {
    let Some(bootstrap_url) = config.bootstrap_url.as_deref() else {
        debug!("no bootstrap peer configured, starting solo");
        return Ok(0);
    };
    let Some(public_url) = config.public_url.as_deref() else {
        warn!("bootstrap peer configured but public_url is not set, peers cannot reach us");
        return Ok(0);
    };

    let request = build_register_request(state, public_url);
    let response = client.register_peer(bootstrap_url, &request).await?;

    let now = Timestamp::now();
    if let Err(e) = state.registry.register(bootstrap_url, now).await {
        warn!(peer = %bootstrap_url, "could not record bootstrap peer: {e}");
    }

    let mut learned = Vec::new();
    for peer in response.peers {
        // Adopt with the reported last_seen so staleness carries over.
        match state
            .registry
            .register(&peer.url, Timestamp::new(peer.last_seen))
            .await
        {
            Ok(true) => learned.push(peer.url),
            Ok(false) => {}
            Err(e) => debug!(peer = %peer.url, "skipping unusable peer from bootstrap: {e}"),
        }
    }

    if !learned.is_empty() {
        let result = gossip.fan_out_register(&learned, &request).await;
        info!(
            announced = result.sent,
            failed = result.failed,
            "announced ourselves to newly learned peers"
        );
    }

    info!(
        bootstrap = %bootstrap_url,
        learned = learned.len(),
        "bootstrap registration complete"
    );
    Ok(learned.len())
}
