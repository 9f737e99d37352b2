//! Push socket server.
//!
//! Accepts WebSocket connections at `/ws/:address` and streams delivery and
//! commit events for that address. The connection is authenticated at upgrade
//! time with a signed ticket in the query string; after that the socket is
//! one-way and the server only reads control frames from the client.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use relaynet_messages::PushEvent;
use relaynet_types::{BlockHash, Cid, RootId, SessionId, SignerAddress, Timestamp};

use crate::auth::verify_ticket;

/// Shared state for the push server: one broadcast channel per recipient
/// address with at least one live connection. Channels are created on the
/// first subscribe and dropped when the last subscriber disconnects, so the
/// map only ever holds addresses someone is actually listening on.
pub struct PushState {
    channels: RwLock<HashMap<SignerAddress, broadcast::Sender<String>>>,
    channel_capacity: usize,
    auth_skew_secs: u64,
}

impl PushState {
    pub fn new(channel_capacity: usize, auth_skew_secs: u64) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            channel_capacity,
            auth_skew_secs,
        }
    }

    /// Subscribe to events for `address`, creating the channel if this is
    /// the first listener.
    pub async fn subscribe(&self, address: &SignerAddress) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        channels
            .entry(address.clone())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    /// Drop the channel for `address` if no subscribers remain. Called after
    /// a connection closes; a listener that reconnected in the meantime keeps
    /// the channel alive.
    pub async fn release(&self, address: &SignerAddress) {
        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(address) {
            if tx.receiver_count() == 0 {
                channels.remove(address);
                debug!(%address, "dropped push channel, no listeners left");
            }
        }
    }

    /// Number of live connections listening on `address`.
    pub async fn listener_count(&self, address: &SignerAddress) -> usize {
        let channels = self.channels.read().await;
        channels.get(address).map_or(0, |tx| tx.receiver_count())
    }

    /// Push a `message_stored` event to `recipient`, if anyone is listening.
    pub async fn publish_stored(
        &self,
        recipient: &SignerAddress,
        cid: Cid,
        sender: SignerAddress,
        root_id: RootId,
        session_id: SessionId,
        timestamp: u64,
    ) {
        let event = PushEvent::MessageStored {
            cid,
            sender,
            root_id,
            session_id,
            timestamp,
        };
        self.send_to(recipient, &event).await;
    }

    /// Push a `message_committed` event to `recipient`, if anyone is listening.
    #[allow(clippy::too_many_arguments)]
    pub async fn publish_committed(
        &self,
        recipient: &SignerAddress,
        cid: Cid,
        sender: SignerAddress,
        root_id: RootId,
        session_id: SessionId,
        height: u64,
        block_hash: BlockHash,
    ) {
        let event = PushEvent::MessageCommitted {
            cid,
            sender,
            root_id,
            session_id,
            height,
            block_hash,
        };
        self.send_to(recipient, &event).await;
    }

    async fn send_to(&self, recipient: &SignerAddress, event: &PushEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode push event: {e}");
                return;
            }
        };
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(recipient) {
            // Send only fails when every receiver is gone; release() will
            // clean the entry up.
            let _ = tx.send(payload);
        }
    }
}

/// The push server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<PushState>,
}

impl WebSocketServer {
    /// Create a new server with a default channel capacity of 256.
    pub fn new(port: u16, auth_skew_secs: u64) -> Self {
        Self {
            port,
            state: Arc::new(PushState::new(256, auth_skew_secs)),
        }
    }

    /// Create a new server with the provided shared state.
    pub fn with_state(port: u16, state: Arc<PushState>) -> Self {
        Self { port, state }
    }

    /// Start listening for WebSocket connections. This runs until the server
    /// is shut down.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let state = Arc::clone(&self.state);
        let app = Router::new()
            .route("/ws/:address", get(ws_handler))
            .with_state(state);

        let addr = format!("0.0.0.0:{}", self.port);
        info!("push socket server listening on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Signed ticket carried in the upgrade request's query string.
#[derive(Debug, Deserialize)]
struct TicketQuery {
    ts: u64,
    sig: String,
}

/// Axum handler that checks the ticket and upgrades to a WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(address): Path<String>,
    Query(ticket): Query<TicketQuery>,
    State(state): State<Arc<PushState>>,
) -> impl IntoResponse {
    let address = SignerAddress::new(address);
    if let Err(reason) = verify_ticket(
        &address,
        ticket.ts,
        &ticket.sig,
        state.auth_skew_secs,
        Timestamp::now(),
    ) {
        debug!(%address, %reason, "rejected push socket ticket");
        return (StatusCode::UNAUTHORIZED, reason.to_string()).into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, address))
        .into_response()
}

/// Handle a single authenticated connection.
///
/// The flow:
/// 1. Subscribe to the recipient's broadcast channel.
/// 2. Split the socket and spawn a forwarder task for outbound events.
/// 3. Read inbound frames only for close/ping handling.
/// 4. Abort the forwarder and release the channel on disconnect.
async fn handle_socket(socket: WebSocket, state: Arc<PushState>, address: SignerAddress) {
    let rx = state.subscribe(&address).await;
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(ws_sender));

    debug!(%address, "push socket connected");

    let forwarder = tokio::spawn(forward_events(
        rx,
        Arc::clone(&ws_sender),
        address.clone(),
    ));

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%address, "push socket receive error: {e}");
                break;
            }
        };

        match msg {
            Message::Close(_) => {
                debug!(%address, "client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            // The push channel is one-way; inbound text is ignored.
            _ => {}
        }
    }

    forwarder.abort();
    state.release(&address).await;
    debug!(%address, "push socket disconnected");
}

/// Forwarder task: reads events from the recipient's broadcast channel and
/// writes them to the socket.
async fn forward_events(
    mut rx: broadcast::Receiver<String>,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    address: SignerAddress,
) {
    loop {
        match rx.recv().await {
            Ok(payload) => {
                let mut sender = ws_sender.lock().await;
                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(%address, "push client lagged behind by {n} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str) -> SignerAddress {
        SignerAddress::new(name)
    }

    #[tokio::test]
    async fn stored_event_reaches_subscriber() {
        let state = PushState::new(8, 30);
        let recipient = addr("rn_bob");
        let mut rx = state.subscribe(&recipient).await;

        state
            .publish_stored(
                &recipient,
                Cid::new([1u8; 32]),
                addr("rn_alice"),
                RootId::new([2u8; 32]),
                SessionId::new([3u8; 32]),
                42,
            )
            .await;

        let payload = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "message_stored");
        assert_eq!(value["cid"], Cid::new([1u8; 32]).to_hex());
        assert_eq!(value["sender"], "rn_alice");
        assert_eq!(value["timestamp"], 42);
    }

    #[tokio::test]
    async fn committed_event_carries_height_and_block_hash() {
        let state = PushState::new(8, 30);
        let recipient = addr("rn_bob");
        let mut rx = state.subscribe(&recipient).await;

        let block_hash = BlockHash::new([9u8; 32]);
        state
            .publish_committed(
                &recipient,
                Cid::new([1u8; 32]),
                addr("rn_alice"),
                RootId::new([2u8; 32]),
                SessionId::new([3u8; 32]),
                7,
                block_hash,
            )
            .await;

        let payload = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "message_committed");
        assert_eq!(value["height"], 7);
        assert_eq!(value["block_hash"], block_hash.to_hex());
    }

    #[tokio::test]
    async fn publish_without_listener_is_a_noop() {
        let state = PushState::new(8, 30);
        let recipient = addr("rn_nobody");
        assert_eq!(state.listener_count(&recipient).await, 0);

        // Must not create a channel as a side effect.
        state
            .publish_stored(
                &recipient,
                Cid::new([1u8; 32]),
                addr("rn_alice"),
                RootId::new([2u8; 32]),
                SessionId::new([3u8; 32]),
                1,
            )
            .await;
        assert_eq!(state.listener_count(&recipient).await, 0);
    }

    #[tokio::test]
    async fn events_are_routed_per_recipient() {
        let state = PushState::new(8, 30);
        let bob = addr("rn_bob");
        let carol = addr("rn_carol");
        let mut bob_rx = state.subscribe(&bob).await;
        let mut carol_rx = state.subscribe(&carol).await;

        state
            .publish_stored(
                &bob,
                Cid::new([1u8; 32]),
                addr("rn_alice"),
                RootId::new([2u8; 32]),
                SessionId::new([3u8; 32]),
                1,
            )
            .await;

        assert!(bob_rx.recv().await.is_ok());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_keeps_channel_while_other_listeners_remain() {
        let state = PushState::new(8, 30);
        let recipient = addr("rn_bob");
        let first = state.subscribe(&recipient).await;
        let second = state.subscribe(&recipient).await;
        assert_eq!(state.listener_count(&recipient).await, 2);

        drop(first);
        state.release(&recipient).await;
        assert_eq!(state.listener_count(&recipient).await, 1);

        drop(second);
        state.release(&recipient).await;
        assert_eq!(state.listener_count(&recipient).await, 0);

        // A fresh subscribe recreates the channel.
        let _third = state.subscribe(&recipient).await;
        assert_eq!(state.listener_count(&recipient).await, 1);
    }
}
