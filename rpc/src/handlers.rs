//! HTTP request handlers.
//!
//! Wire shapes live in `relaynet-messages`; query-string parameters are
//! defined here. Handlers return protocol refusals (rejected votes,
//! unconvincing commits, duplicate deliveries) as 200s with the refusal in
//! the body, and reserve error statuses for unusable requests.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::{debug, info, warn};

use relaynet_consensus::ProposalValidator;
use relaynet_crypto::{
    block_hash, cid_of, decode_address, root_id, session_id, sign_message, validate_address,
    verify_signature,
};
use relaynet_messages::{
    delivery_signing_string, registration_signing_string, BlocksResponse, CommitRequest,
    CommitResponse, ConversationResponse, DeliverRequest, DeliverResponse, HealthResponse,
    MessageSummary, MessagesResponse, PayloadResponse, PeerListResponse, RegisterPeerRequest,
    RegisterPeerResponse, ReplicateRequest, ReplicateResponse, TipResponse, VoteResponse,
};
use relaynet_store::{MessageRecord, StoreError};
use relaynet_types::{Block, Cid, RootId, SignerAddress, Timestamp};

use crate::chain::{apply_committed_block, StoreChainView};
use crate::error::RpcError;
use crate::state::AppState;

/// Default page size when a list query gives no `count`/`limit`.
const DEFAULT_BLOCKS_PAGE: usize = 100;
const DEFAULT_MESSAGES_PAGE: usize = 50;

// ── Peer registry ──────────────────────────────────────────────────────

pub async fn register_peer(
    State(state): State<AppState>,
    Json(request): Json<RegisterPeerRequest>,
) -> Result<Json<RegisterPeerResponse>, RpcError> {
    if state.settings.require_peer_auth {
        verify_registration_auth(&state, &request)?;
    }

    let now = Timestamp::now();
    let registered = state
        .registry
        .register(&request.url, now)
        .await
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    if registered {
        info!(url = %request.url, "registered peer");
    }

    let peers = state.registry.known_peers(now).await;
    Ok(Json(RegisterPeerResponse { registered, peers }))
}

fn verify_registration_auth(
    state: &AppState,
    request: &RegisterPeerRequest,
) -> Result<(), RpcError> {
    let (Some(address), Some(timestamp), Some(signature)) =
        (&request.address, request.timestamp, &request.signature)
    else {
        return Err(RpcError::InvalidRequest(
            "registration requires address, timestamp, and signature".into(),
        ));
    };
    let public_key = decode_address(address.as_str())
        .ok_or_else(|| RpcError::InvalidRequest("registering address is not valid".into()))?;
    if Timestamp::now().as_secs().abs_diff(timestamp) > state.settings.auth_skew_secs {
        return Err(RpcError::InvalidRequest(
            "registration timestamp is outside the accepted window".into(),
        ));
    }
    let message = registration_signing_string(&request.url, timestamp);
    if !verify_signature(message.as_bytes(), signature, &public_key) {
        return Err(RpcError::BadSignature(
            "registration signature does not match".into(),
        ));
    }
    Ok(())
}

pub async fn list_peers(State(state): State<AppState>) -> Json<PeerListResponse> {
    let peers = state.registry.known_peers(Timestamp::now()).await;
    Json(PeerListResponse { peers })
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, RpcError> {
    let tip = state.blocks.tip()?;
    Ok(Json(HealthResponse {
        address: state.address.clone(),
        height: tip.as_ref().map(|block| block.idx),
        tip: tip.as_ref().map(block_hash),
    }))
}

// ── Message intake ─────────────────────────────────────────────────────

pub async fn deliver(
    State(state): State<AppState>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<DeliverResponse>, RpcError> {
    let payload = hex::decode(&request.payload)
        .map_err(|_| RpcError::InvalidRequest("payload is not valid hex".into()))?;
    if payload.is_empty() {
        return Err(RpcError::InvalidRequest("payload is empty".into()));
    }
    if payload.len() > state.settings.max_payload_bytes {
        return Err(RpcError::PayloadTooLarge {
            size: payload.len(),
            max: state.settings.max_payload_bytes,
        });
    }

    let sender_key = decode_address(request.sender.as_str())
        .ok_or_else(|| RpcError::InvalidRequest("sender address is not valid".into()))?;
    if !validate_address(request.recipient.as_str()) {
        return Err(RpcError::InvalidRequest(
            "recipient address is not valid".into(),
        ));
    }

    // The cid is recomputed from the bytes; the sender signed over it, so a
    // payload swap also breaks the signature.
    let cid = cid_of(&payload);
    let signing =
        delivery_signing_string(&cid, &request.sender, &request.recipient, request.timestamp);
    if !verify_signature(signing.as_bytes(), &request.signature, &sender_key) {
        return Err(RpcError::BadSignature(
            "delivery signature does not match".into(),
        ));
    }

    let root = root_id(&request.sender, &request.recipient);
    let session = session_id(
        &root,
        Timestamp::new(request.timestamp),
        state.settings.session_window_secs,
    );

    if let Some(existing) = state.messages.get_message(&cid)? {
        debug!(%cid, "duplicate delivery");
        return Ok(Json(DeliverResponse {
            cid,
            delivered: existing.delivered,
            duplicate: true,
            root_id: root,
            session_id: session,
        }));
    }

    let record = MessageRecord {
        cid,
        sender: request.sender.clone(),
        recipient: request.recipient.clone(),
        timestamp: Timestamp::new(request.timestamp),
        root_id: root,
        session_id: session,
        delivered: false,
        committed: false,
    };
    state.messages.put_payload(&cid, &payload)?;
    if let Err(e) = state.messages.put_message(&record) {
        return match e {
            // Raced a concurrent delivery of the same payload.
            StoreError::Duplicate(_) => {
                let delivered = state
                    .messages
                    .get_message(&cid)?
                    .map_or(false, |row| row.delivered);
                Ok(Json(DeliverResponse {
                    cid,
                    delivered,
                    duplicate: true,
                    root_id: root,
                    session_id: session,
                }))
            }
            other => Err(other.into()),
        };
    }

    info!(%cid, sender = %request.sender, recipient = %request.recipient, "stored message");
    state
        .push
        .publish_stored(
            &request.recipient,
            cid,
            request.sender.clone(),
            root,
            session,
            request.timestamp,
        )
        .await;

    // Replication: with no online peers the local copy is the only replica
    // and delivery completes before the response; otherwise the fan-out runs
    // in the background and flips the flag once enough peers ack.
    let replicate_request = ReplicateRequest {
        cid,
        payload: request.payload,
        sender: request.sender,
        recipient: request.recipient,
        timestamp: request.timestamp,
        root_id: root,
        session_id: session,
    };
    if state.registry.online_count(Timestamp::now()).await == 0 {
        run_replication(&state, replicate_request).await;
    } else {
        let background = state.clone();
        tokio::spawn(async move {
            run_replication(&background, replicate_request).await;
        });
    }

    let delivered = state
        .messages
        .get_message(&cid)?
        .map_or(false, |row| row.delivered);
    Ok(Json(DeliverResponse {
        cid,
        delivered,
        duplicate: false,
        root_id: root,
        session_id: session,
    }))
}

async fn run_replication(state: &AppState, request: ReplicateRequest) {
    let cid = request.cid;
    let outcome = state.replication.replicate(&request).await;
    if outcome.delivered {
        if let Err(e) = state.messages.mark_delivered(&cid) {
            warn!(%cid, "failed to mark delivered: {e}");
        }
    }
}

pub async fn replicate(
    State(state): State<AppState>,
    Json(request): Json<ReplicateRequest>,
) -> Result<Json<ReplicateResponse>, RpcError> {
    let payload = hex::decode(&request.payload)
        .map_err(|_| RpcError::InvalidRequest("payload is not valid hex".into()))?;
    if payload.len() > state.settings.max_payload_bytes {
        return Err(RpcError::PayloadTooLarge {
            size: payload.len(),
            max: state.settings.max_payload_bytes,
        });
    }
    if cid_of(&payload) != request.cid {
        return Err(RpcError::InvalidRequest(
            "payload does not match cid".into(),
        ));
    }

    let record = MessageRecord {
        cid: request.cid,
        sender: request.sender.clone(),
        recipient: request.recipient.clone(),
        timestamp: Timestamp::new(request.timestamp),
        root_id: request.root_id,
        session_id: request.session_id,
        // A replica row is born delivered: the network placed the copy here,
        // and proposals carrying this cid must pass this node's content check.
        delivered: true,
        committed: false,
    };
    state.messages.put_payload(&request.cid, &payload)?;
    let stored = match state.messages.put_message(&record) {
        Ok(()) => true,
        Err(StoreError::Duplicate(_)) => {
            // Replay of a replica we already hold; make sure the flag stuck.
            state.messages.mark_delivered(&request.cid)?;
            false
        }
        Err(e) => return Err(e.into()),
    };

    if stored {
        debug!(cid = %request.cid, "stored replica");
        state
            .push
            .publish_stored(
                &request.recipient,
                request.cid,
                request.sender,
                request.root_id,
                request.session_id,
                request.timestamp,
            )
            .await;
    }

    Ok(Json(ReplicateResponse {
        cid: request.cid,
        stored,
    }))
}

// ── Consensus ──────────────────────────────────────────────────────────

pub async fn proposal(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<VoteResponse>, RpcError> {
    let view = StoreChainView::new(state.blocks.as_ref(), state.messages.as_ref());
    let validator = ProposalValidator::new(state.settings.max_block_cids);

    let response = match validator.validate(&view, &block) {
        Ok(hash) => {
            let signature = sign_message(hash.as_bytes(), &state.keypair.private);
            debug!(height = block.idx, %hash, "voting to accept proposal");
            VoteResponse {
                block_hash: hash,
                accept: true,
                voter: state.address.clone(),
                signature: Some(signature),
                reason: None,
            }
        }
        Err(reason) => {
            let hash = block_hash(&block);
            debug!(height = block.idx, %hash, reason = reason.code(), "voting to reject proposal");
            VoteResponse {
                block_hash: hash,
                accept: false,
                voter: state.address.clone(),
                signature: None,
                reason: Some(reason.code().to_string()),
            }
        }
    };
    Ok(Json(response))
}

pub async fn commit(
    State(state): State<AppState>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, RpcError> {
    let response = apply_committed_block(&state, &request.block, &request.votes).await?;
    Ok(Json(response))
}

// ── Chain queries ──────────────────────────────────────────────────────

pub async fn chain_tip(State(state): State<AppState>) -> Result<Json<TipResponse>, RpcError> {
    let tip = state.blocks.tip()?;
    Ok(Json(TipResponse {
        height: tip.as_ref().map(|block| block.idx),
        hash: tip.as_ref().map(block_hash),
    }))
}

#[derive(Debug, Deserialize)]
pub struct BlocksQuery {
    pub from: Option<u64>,
    pub count: Option<usize>,
}

pub async fn blocks(
    State(state): State<AppState>,
    Query(query): Query<BlocksQuery>,
) -> Result<Json<BlocksResponse>, RpcError> {
    let from = query.from.unwrap_or(0);
    let count = query
        .count
        .unwrap_or(DEFAULT_BLOCKS_PAGE)
        .clamp(1, state.settings.max_blocks_page);
    let blocks = state.blocks.blocks_from(from, count)?;
    Ok(Json(BlocksResponse { blocks }))
}

// ── Message queries ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

pub async fn messages_for(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, RpcError> {
    let recipient = SignerAddress::new(address);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGES_PAGE)
        .clamp(1, state.settings.max_messages_page);
    let records = state
        .messages
        .messages_for_recipient(&recipient, query.since, limit)?;
    Ok(Json(MessagesResponse {
        messages: records.into_iter().map(summarize).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub before: Option<u64>,
    pub limit: Option<usize>,
}

pub async fn conversation(
    State(state): State<AppState>,
    Path(root): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationResponse>, RpcError> {
    let root_id: RootId = root
        .parse()
        .map_err(|_| RpcError::InvalidRequest("root id is not valid hex".into()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGES_PAGE)
        .clamp(1, state.settings.max_messages_page);
    let records = state
        .messages
        .conversation_page(&root_id, query.before, limit)?;
    Ok(Json(ConversationResponse {
        root_id,
        messages: records.into_iter().map(summarize).collect(),
    }))
}

pub async fn fetch_payload(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<PayloadResponse>, RpcError> {
    let cid: Cid = cid
        .parse()
        .map_err(|_| RpcError::InvalidRequest("cid is not valid hex".into()))?;
    let payload = state
        .messages
        .get_payload(&cid)?
        .ok_or_else(|| RpcError::NotFound(format!("payload {cid}")))?;
    // Integrity gate: bytes must still hash to the cid they are filed under.
    if cid_of(&payload) != cid {
        return Err(RpcError::Internal(format!(
            "stored payload fails integrity check for {cid}"
        )));
    }
    Ok(Json(PayloadResponse {
        cid,
        payload: hex::encode(payload),
    }))
}

fn summarize(record: MessageRecord) -> MessageSummary {
    MessageSummary {
        cid: record.cid,
        sender: record.sender,
        recipient: record.recipient,
        timestamp: record.timestamp.as_secs(),
        root_id: record.root_id,
        session_id: record.session_id,
        delivered: record.delivered,
        committed: record.committed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RpcSettings;
    use relaynet_crypto::{derive_address, keypair_from_seed, merkle_root, sign_block};
    use relaynet_messages::VoteReceipt;
    use relaynet_network::{NodeClient, PeerRegistry, ReplicationEngine};
    use relaynet_store_lmdb::LmdbEnvironment;
    use relaynet_types::{BlockHash, KeyPair, SessionId, Signature};
    use relaynet_websocket::PushState;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_state_with(settings: RpcSettings) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let env = LmdbEnvironment::open(dir.path()).unwrap();
        let registry = Arc::new(PeerRegistry::new(None, 300, 3600).unwrap());
        let client = NodeClient::new().unwrap();
        let replication = Arc::new(ReplicationEngine::new(
            client,
            Arc::clone(&registry),
            3,
            1,
            Duration::from_millis(100),
        ));
        let push = Arc::new(PushState::new(8, 300));
        let keypair = Arc::new(keypair_from_seed(&[42u8; 32]));
        let state = AppState::new(
            env.messages.clone(),
            env.blocks.clone(),
            registry,
            replication,
            push,
            keypair,
            settings,
        );
        (state, dir)
    }

    fn test_state() -> (AppState, TempDir) {
        test_state_with(RpcSettings::default())
    }

    fn signed_deliver(seed: u8, recipient: &SignerAddress, payload: &[u8], ts: u64) -> DeliverRequest {
        let keypair = keypair_from_seed(&[seed; 32]);
        let sender = derive_address(&keypair.public);
        let cid = cid_of(payload);
        let signing = delivery_signing_string(&cid, &sender, recipient, ts);
        let signature = relaynet_crypto::sign_message(signing.as_bytes(), &keypair.private);
        DeliverRequest {
            payload: hex::encode(payload),
            sender,
            recipient: recipient.clone(),
            timestamp: ts,
            signature,
        }
    }

    fn recipient() -> SignerAddress {
        derive_address(&keypair_from_seed(&[9u8; 32]).public)
    }

    fn build_block(
        proposer: &KeyPair,
        idx: u64,
        previous_hash: BlockHash,
        cids: Vec<Cid>,
    ) -> Block {
        let merkle = merkle_root(&cids).unwrap();
        let mut block = Block {
            idx,
            previous_hash,
            merkle_root: merkle,
            cids,
            proposer: derive_address(&proposer.public),
            timestamp: 12_345,
            signature: Signature([0u8; 64]),
        };
        block.signature = sign_block(&block, &proposer.private);
        block
    }

    #[tokio::test]
    async fn deliver_persists_and_is_idempotent() {
        let (state, _dir) = test_state();
        let request = signed_deliver(1, &recipient(), b"ciphertext", 1_000);

        let Json(first) = deliver(State(state.clone()), Json(request.clone()))
            .await
            .unwrap();
        assert!(!first.duplicate);
        // No online peers: the local copy is the only replica.
        assert!(first.delivered);

        let Json(second) = deliver(State(state.clone()), Json(request)).await.unwrap();
        assert!(second.duplicate);
        assert_eq!(first.cid, second.cid);

        let row = state.messages.get_message(&first.cid).unwrap().unwrap();
        assert!(row.delivered);
        assert!(!row.committed);
    }

    #[tokio::test]
    async fn deliver_rejects_a_tampered_signature() {
        let (state, _dir) = test_state();
        let mut request = signed_deliver(1, &recipient(), b"ciphertext", 1_000);
        request.timestamp += 1;

        let err = deliver(State(state), Json(request)).await.unwrap_err();
        assert!(matches!(err, RpcError::BadSignature(_)));
    }

    #[tokio::test]
    async fn deliver_enforces_the_payload_cap() {
        let settings = RpcSettings {
            max_payload_bytes: 4,
            ..RpcSettings::default()
        };
        let (state, _dir) = test_state_with(settings);
        let request = signed_deliver(1, &recipient(), b"five!", 1_000);

        let err = deliver(State(state), Json(request)).await.unwrap_err();
        assert!(matches!(err, RpcError::PayloadTooLarge { size: 5, max: 4 }));
    }

    #[tokio::test]
    async fn replicate_rejects_a_cid_mismatch() {
        let (state, _dir) = test_state();
        let request = ReplicateRequest {
            cid: cid_of(b"other bytes"),
            payload: hex::encode(b"ciphertext"),
            sender: recipient(),
            recipient: recipient(),
            timestamp: 1_000,
            root_id: RootId::new([1u8; 32]),
            session_id: SessionId::new([2u8; 32]),
        };

        let err = replicate(State(state), Json(request)).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn replica_rows_are_born_delivered() {
        let (state, _dir) = test_state();
        let payload = b"replicated ciphertext";
        let cid = cid_of(payload);
        let request = ReplicateRequest {
            cid,
            payload: hex::encode(payload),
            sender: derive_address(&keypair_from_seed(&[1u8; 32]).public),
            recipient: recipient(),
            timestamp: 1_000,
            root_id: RootId::new([1u8; 32]),
            session_id: SessionId::new([2u8; 32]),
        };

        let Json(first) = replicate(State(state.clone()), Json(request.clone()))
            .await
            .unwrap();
        assert!(first.stored);

        let row = state.messages.get_message(&cid).unwrap().unwrap();
        assert!(row.delivered);

        // A replay acks without storing again.
        let Json(second) = replicate(State(state), Json(request)).await.unwrap();
        assert!(!second.stored);
    }

    #[tokio::test]
    async fn proposal_and_commit_round_trip() {
        let (state, _dir) = test_state();

        // Deliver a message so the cid passes content sanity.
        let request = signed_deliver(1, &recipient(), b"block me", 1_000);
        let Json(delivered) = deliver(State(state.clone()), Json(request)).await.unwrap();

        let proposer = keypair_from_seed(&[7u8; 32]);
        let block = build_block(&proposer, 0, BlockHash::ZERO, vec![delivered.cid]);

        let Json(vote) = proposal(State(state.clone()), Json(block.clone()))
            .await
            .unwrap();
        assert!(vote.accept, "reason: {:?}", vote.reason);
        let receipt = VoteReceipt {
            voter: vote.voter,
            signature: vote.signature.unwrap(),
        };

        // Single-node quorum: one valid receipt commits.
        let Json(outcome) = commit(
            State(state.clone()),
            Json(CommitRequest {
                block: block.clone(),
                votes: vec![receipt.clone()],
            }),
        )
        .await
        .unwrap();
        assert!(outcome.committed);
        assert_eq!(outcome.height, Some(0));

        let row = state.messages.get_message(&delivered.cid).unwrap().unwrap();
        assert!(row.committed);

        // Idempotent re-commit of the same block.
        let Json(again) = commit(
            State(state.clone()),
            Json(CommitRequest {
                block,
                votes: vec![receipt],
            }),
        )
        .await
        .unwrap();
        assert!(again.committed);
        assert_eq!(again.height, Some(0));

        let Json(tip) = chain_tip(State(state)).await.unwrap();
        assert_eq!(tip.height, Some(0));
    }

    #[tokio::test]
    async fn proposal_rejects_unknown_content() {
        let (state, _dir) = test_state();
        let proposer = keypair_from_seed(&[7u8; 32]);
        let block = build_block(&proposer, 0, BlockHash::ZERO, vec![cid_of(b"never seen")]);

        let Json(vote) = proposal(State(state), Json(block)).await.unwrap();
        assert!(!vote.accept);
        assert_eq!(vote.reason.as_deref(), Some("unknown_content"));
        assert!(vote.signature.is_none());
    }

    #[tokio::test]
    async fn commit_refuses_thin_evidence() {
        let (state, _dir) = test_state();
        let now = Timestamp::now();
        // Two online peers: quorum over three nodes needs two receipts.
        state
            .registry
            .register("http://peer-a:8470", now)
            .await
            .unwrap();
        state
            .registry
            .register("http://peer-b:8470", now)
            .await
            .unwrap();

        let request = signed_deliver(1, &recipient(), b"thin", 1_000);
        let Json(delivered) = deliver(State(state.clone()), Json(request)).await.unwrap();

        let proposer = keypair_from_seed(&[7u8; 32]);
        let block = build_block(&proposer, 0, BlockHash::ZERO, vec![delivered.cid]);
        let Json(vote) = proposal(State(state.clone()), Json(block.clone()))
            .await
            .unwrap();
        let receipt = VoteReceipt {
            voter: vote.voter,
            signature: vote.signature.unwrap(),
        };

        let Json(outcome) = commit(
            State(state.clone()),
            Json(CommitRequest {
                block,
                votes: vec![receipt],
            }),
        )
        .await
        .unwrap();
        assert!(!outcome.committed);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("insufficient quorum evidence")
        );
        assert_eq!(state.blocks.block_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn fetch_payload_verifies_integrity() {
        let (state, _dir) = test_state();
        let request = signed_deliver(1, &recipient(), b"fetch me", 1_000);
        let Json(delivered) = deliver(State(state.clone()), Json(request)).await.unwrap();

        let Json(fetched) = fetch_payload(State(state.clone()), Path(delivered.cid.to_hex()))
            .await
            .unwrap();
        assert_eq!(fetched.payload, hex::encode(b"fetch me"));

        // Corrupt the stored bytes; the fetch must refuse to serve them.
        state
            .messages
            .put_payload(&delivered.cid, b"swapped")
            .unwrap();
        let err = fetch_payload(State(state), Path(delivered.cid.to_hex()))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Internal(_)));
    }

    #[tokio::test]
    async fn fetch_payload_misses_with_404() {
        let (state, _dir) = test_state();
        let err = fetch_payload(State(state), Path(cid_of(b"absent").to_hex()))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::NotFound(_)));
    }

    #[tokio::test]
    async fn signed_registration_is_checked_when_required() {
        let settings = RpcSettings {
            require_peer_auth: true,
            ..RpcSettings::default()
        };
        let (state, _dir) = test_state_with(settings);

        let keypair = keypair_from_seed(&[3u8; 32]);
        let address = derive_address(&keypair.public);
        let url = "http://peer-c:8470".to_string();
        let ts = Timestamp::now().as_secs();
        let signature = relaynet_crypto::sign_message(
            registration_signing_string(&url, ts).as_bytes(),
            &keypair.private,
        );

        // Unsigned request is refused outright.
        let bare = RegisterPeerRequest {
            url: url.clone(),
            address: None,
            timestamp: None,
            signature: None,
        };
        assert!(register_peer(State(state.clone()), Json(bare)).await.is_err());

        let signed = RegisterPeerRequest {
            url: url.clone(),
            address: Some(address),
            timestamp: Some(ts),
            signature: Some(signature),
        };
        let Json(response) = register_peer(State(state.clone()), Json(signed))
            .await
            .unwrap();
        assert!(response.registered);
        assert_eq!(response.peers.len(), 1);
        assert_eq!(response.peers[0].url, url);
    }

    #[tokio::test]
    async fn conversation_pages_newest_first() {
        let (state, _dir) = test_state();
        let to = recipient();
        for (i, ts) in [(1u8, 1_000u64), (2, 2_000), (3, 3_000)] {
            let request = signed_deliver(i, &to, format!("msg {i}").as_bytes(), ts);
            deliver(State(state.clone()), Json(request)).await.unwrap();
        }

        // All three senders share the recipient but not each other, so pick
        // one conversation and page it.
        let sender = derive_address(&keypair_from_seed(&[1u8; 32]).public);
        let root = root_id(&sender, &to);
        let Json(page) = conversation(
            State(state.clone()),
            Path(root.to_hex()),
            Query(ConversationQuery {
                before: None,
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].sender, sender);

        let Json(inbox) = messages_for(
            State(state),
            Path(to.to_string()),
            Query(MessagesQuery {
                since: None,
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(inbox.messages.len(), 3);
        // Newest first.
        assert_eq!(inbox.messages[0].timestamp, 3_000);
        assert_eq!(inbox.messages[2].timestamp, 1_000);
    }
}
