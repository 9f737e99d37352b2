//! Wire message types for RelayNet node-to-node and client communication.
//!
//! Every HTTP endpoint and WebSocket event speaks the JSON shapes defined
//! here, shared between the server handlers and the peer client so the two
//! sides cannot drift apart. Payload bytes travel hex-encoded; all hashes,
//! cids, and signatures use their hex text forms from `relaynet-types`.

use relaynet_types::{Block, BlockHash, Cid, RootId, SessionId, Signature, SignerAddress};
use serde::{Deserialize, Serialize};

// ── Canonical signing strings ──────────────────────────────────────────
//
// Clients and peers sign these exact strings; servers rebuild them from the
// request fields and verify against the key embedded in the signer address.

/// The string a sender signs when delivering a message.
pub fn delivery_signing_string(
    cid: &Cid,
    sender: &SignerAddress,
    recipient: &SignerAddress,
    timestamp: u64,
) -> String {
    format!("{}|{}|{}|{}", cid, sender, recipient, timestamp)
}

/// The string a node signs when registering with a peer.
pub fn registration_signing_string(url: &str, timestamp: u64) -> String {
    format!("register|{}|{}", url, timestamp)
}

/// The string a recipient signs to open an authenticated push socket.
pub fn ws_ticket_string(address: &SignerAddress, timestamp: u64) -> String {
    format!("ws|{}|{}", address, timestamp)
}

// ── Peer registry ──────────────────────────────────────────────────────

/// Register (or refresh) a peer. The auth fields are required only when the
/// receiving node runs with peer authentication enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterPeerRequest {
    /// Base URL the caller is reachable at, e.g. `http://10.0.0.5:8470`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<SignerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

/// Registration reply: the full current peer list, so a joining node can
/// seed its own registry from a single call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterPeerResponse {
    pub registered: bool,
    pub peers: Vec<PeerInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerInfo {
    pub url: String,
    /// Unix seconds of the last successful contact.
    pub last_seen: u64,
    /// Derived liveness at response time.
    pub online: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerListResponse {
    pub peers: Vec<PeerInfo>,
}

/// Heartbeat reply. Carries the chain tip so a pinging peer can notice it
/// has fallen behind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub address: SignerAddress,
    pub height: Option<u64>,
    pub tip: Option<BlockHash>,
}

// ── Message intake and replication ─────────────────────────────────────

/// Client request to deliver an encrypted message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliverRequest {
    /// Encrypted payload bytes, hex-encoded.
    pub payload: String,
    pub sender: SignerAddress,
    pub recipient: SignerAddress,
    /// Sender-supplied Unix seconds.
    pub timestamp: u64,
    /// Sender's signature over [`delivery_signing_string`].
    pub signature: Signature,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliverResponse {
    pub cid: Cid,
    /// Whether the replication threshold has been reached yet.
    pub delivered: bool,
    /// True when the cid was already known; the request was a no-op.
    pub duplicate: bool,
    pub root_id: RootId,
    pub session_id: SessionId,
}

/// Peer-to-peer replication push. Carries full metadata so the replica can
/// persist a complete message row alongside the payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub cid: Cid,
    /// Encrypted payload bytes, hex-encoded.
    pub payload: String,
    pub sender: SignerAddress,
    pub recipient: SignerAddress,
    pub timestamp: u64,
    pub root_id: RootId,
    pub session_id: SessionId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicateResponse {
    pub cid: Cid,
    pub stored: bool,
}

// ── Consensus ──────────────────────────────────────────────────────────

/// A voter's reply to a block proposal. Accepting voters sign the block
/// hash; rejecting voters name the first validation failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub block_hash: BlockHash,
    pub accept: bool,
    pub voter: SignerAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One accepting voter's signature over a block hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub voter: SignerAddress,
    pub signature: Signature,
}

/// Proposer's commit broadcast: the block plus enough vote receipts to
/// prove quorum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitRequest {
    pub block: Block,
    pub votes: Vec<VoteReceipt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitResponse {
    pub committed: bool,
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Chain tip summary. Both fields are `None` before genesis commits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TipResponse {
    pub height: Option<u64>,
    pub hash: Option<BlockHash>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlocksResponse {
    pub blocks: Vec<Block>,
}

// ── Message queries ────────────────────────────────────────────────────

/// Message metadata as served to clients. The payload itself is fetched
/// separately by cid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageSummary {
    pub cid: Cid,
    pub sender: SignerAddress,
    pub recipient: SignerAddress,
    pub timestamp: u64,
    pub root_id: RootId,
    pub session_id: SessionId,
    pub delivered: bool,
    pub committed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageSummary>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub root_id: RootId,
    pub messages: Vec<MessageSummary>,
}

/// Payload fetch reply. The bytes are re-verified against the cid before
/// they are served.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayloadResponse {
    pub cid: Cid,
    /// Encrypted payload bytes, hex-encoded.
    pub payload: String,
}

/// Uniform error body for non-2xx responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Realtime push ──────────────────────────────────────────────────────

/// Events pushed to a connected recipient over the WebSocket channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushEvent {
    /// The message row is durably persisted on this node.
    MessageStored {
        cid: Cid,
        sender: SignerAddress,
        root_id: RootId,
        session_id: SessionId,
        timestamp: u64,
    },
    /// A block containing the message has been committed.
    MessageCommitted {
        cid: Cid,
        sender: SignerAddress,
        root_id: RootId,
        session_id: SessionId,
        height: u64,
        block_hash: BlockHash,
    },
}
