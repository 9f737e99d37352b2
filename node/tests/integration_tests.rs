//! Integration tests exercising the full relay pipeline:
//! message intake → replication bookkeeping → block proposal → quorum →
//! LMDB persistence → readback and push events.
//!
//! These tests wire together components that are normally only connected
//! inside `node.rs`, verifying the system works end-to-end — not just
//! in isolation.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, State};
use relaynet_crypto::{
    block_hash, cid_of, derive_address, keypair_from_seed, sign_message,
};
use relaynet_messages::{delivery_signing_string, DeliverRequest, VoteReceipt};
use relaynet_network::{Gossip, NodeClient, PeerRegistry, ReplicationEngine};
use relaynet_node::{apply_blocks, ProposalOutcome, Proposer};
use relaynet_rpc::{apply_committed_block, handlers, AppState, RpcSettings};
use relaynet_store_lmdb::LmdbEnvironment;
use relaynet_types::{Block, KeyPair, SignerAddress};
use relaynet_websocket::PushState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A node's working parts, minus the servers and loops.
struct TestNode {
    _dir: tempfile::TempDir,
    state: AppState,
    gossip: Arc<Gossip>,
}

fn test_node(seed: u8) -> TestNode {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path()).expect("open env");
    let registry = Arc::new(PeerRegistry::new(None, 300, 3600).expect("registry"));
    let client = NodeClient::new().expect("client");
    let replication = Arc::new(ReplicationEngine::new(
        client.clone(),
        Arc::clone(&registry),
        3,
        1,
        Duration::from_millis(200),
    ));
    let gossip = Arc::new(Gossip::new(client, Arc::clone(&registry)));
    let state = AppState::new(
        env.messages.clone(),
        env.blocks.clone(),
        registry,
        replication,
        Arc::new(PushState::new(16, 300)),
        Arc::new(keypair_from_seed(&[seed; 32])),
        RpcSettings::default(),
    );
    TestNode {
        _dir: dir,
        state,
        gossip,
    }
}

fn proposer_for(node: &TestNode) -> Proposer {
    Proposer::new(node.state.clone(), Arc::clone(&node.gossip), 20, 1)
}

fn client_keypair(seed: u8) -> (KeyPair, SignerAddress) {
    let kp = keypair_from_seed(&[seed; 32]);
    let address = derive_address(&kp.public);
    (kp, address)
}

fn signed_deliver(
    sender_kp: &KeyPair,
    recipient: &SignerAddress,
    payload: &[u8],
    timestamp: u64,
) -> DeliverRequest {
    let sender = derive_address(&sender_kp.public);
    let cid = cid_of(payload);
    let signing = delivery_signing_string(&cid, &sender, recipient, timestamp);
    DeliverRequest {
        payload: hex::encode(payload),
        sender,
        recipient: recipient.clone(),
        timestamp,
        signature: sign_message(signing.as_bytes(), &sender_kp.private),
    }
}

async fn deliver(node: &TestNode, request: DeliverRequest) -> relaynet_messages::DeliverResponse {
    let Json(response) = handlers::deliver(State(node.state.clone()), Json(request))
        .await
        .expect("deliver accepted");
    response
}

// ---------------------------------------------------------------------------
// 1. Full pipeline on a single node: deliver → propose → commit → readback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_node_pipeline_commits_delivered_messages() {
    let node = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    // With no peers the local copy is the only replica, so the message is
    // delivered immediately.
    let response = deliver(&node, signed_deliver(&alice, &bob, b"hello bob", 1_700_000_000)).await;
    assert!(response.delivered);
    assert!(!response.duplicate);

    // The proposer should bundle it and, alone in the network, commit at
    // height 0 off its own majority.
    let proposer = proposer_for(&node);
    let outcome = proposer.run_round().await.expect("round runs");
    assert_eq!(outcome, ProposalOutcome::Committed(0));

    let tip = node.state.blocks.tip().expect("tip").expect("present");
    assert_eq!(tip.idx, 0);
    assert_eq!(tip.cids, vec![response.cid]);

    let record = node
        .state
        .messages
        .get_message(&response.cid)
        .expect("read")
        .expect("present");
    assert!(record.committed);

    // Nothing left pending: the next round is idle.
    let outcome = proposer.run_round().await.expect("round runs");
    assert_eq!(outcome, ProposalOutcome::Idle);
}

// ---------------------------------------------------------------------------
// 2. Block cids are sorted regardless of arrival order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proposed_block_carries_ascending_cids() {
    let node = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    for (payload, ts) in [
        (b"zebra".as_slice(), 1_700_000_000),
        (b"apple".as_slice(), 1_700_000_001),
        (b"mango".as_slice(), 1_700_000_002),
    ] {
        deliver(&node, signed_deliver(&alice, &bob, payload, ts)).await;
    }

    let proposer = proposer_for(&node);
    let outcome = proposer.run_round().await.expect("round runs");
    assert!(matches!(outcome, ProposalOutcome::Committed(0)));

    let tip = node.state.blocks.tip().expect("tip").expect("present");
    assert_eq!(tip.cids.len(), 3);
    let mut sorted = tip.cids.clone();
    sorted.sort();
    assert_eq!(tip.cids, sorted);
}

// ---------------------------------------------------------------------------
// 3. Consecutive rounds extend the chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consecutive_rounds_link_blocks() {
    let node = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);
    let proposer = proposer_for(&node);

    deliver(&node, signed_deliver(&alice, &bob, b"first wave", 1_700_000_000)).await;
    proposer.run_round().await.expect("first round");

    deliver(&node, signed_deliver(&alice, &bob, b"second wave", 1_700_000_100)).await;
    let outcome = proposer.run_round().await.expect("second round");
    assert_eq!(outcome, ProposalOutcome::Committed(1));

    let genesis = node
        .state
        .blocks
        .get_block(0)
        .expect("read")
        .expect("present");
    let second = node
        .state
        .blocks
        .get_block(1)
        .expect("read")
        .expect("present");
    assert_eq!(second.previous_hash, block_hash(&genesis));
}

// ---------------------------------------------------------------------------
// 4. Push events reach a subscribed recipient in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recipient_sees_stored_then_committed_events() {
    let node = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    let mut events = node.state.push.subscribe(&bob).await;

    let response = deliver(&node, signed_deliver(&alice, &bob, b"ping", 1_700_000_000)).await;
    proposer_for(&node).run_round().await.expect("round runs");

    let stored: serde_json::Value =
        serde_json::from_str(&events.recv().await.expect("stored event")).expect("json");
    assert_eq!(stored["event"], "message_stored");
    assert_eq!(stored["cid"], response.cid.to_string());

    let committed: serde_json::Value =
        serde_json::from_str(&events.recv().await.expect("committed event")).expect("json");
    assert_eq!(committed["event"], "message_committed");
    assert_eq!(committed["cid"], response.cid.to_string());
    assert_eq!(committed["height"], 0);
}

// ---------------------------------------------------------------------------
// 5. A second node replays the chain via catch-up sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_node_catches_up_from_anothers_chain() {
    let node_a = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);
    let proposer = proposer_for(&node_a);

    deliver(&node_a, signed_deliver(&alice, &bob, b"block one", 1_700_000_000)).await;
    proposer.run_round().await.expect("first round");
    deliver(&node_a, signed_deliver(&alice, &bob, b"block two", 1_700_000_100)).await;
    proposer.run_round().await.expect("second round");

    let chain: Vec<Block> = node_a
        .state
        .blocks
        .blocks_from(0, 10)
        .expect("read chain");
    assert_eq!(chain.len(), 2);

    // Node B never saw the messages, only the blocks. Catch-up still
    // applies them; the missing replicas are simply not marked.
    let node_b = test_node(2);
    let applied = apply_blocks(&node_b.state, &chain).await.expect("apply");
    assert_eq!(applied, 2);

    let tip_a = node_a.state.blocks.tip().expect("tip").expect("present");
    let tip_b = node_b.state.blocks.tip().expect("tip").expect("present");
    assert_eq!(block_hash(&tip_a), block_hash(&tip_b));
}

// ---------------------------------------------------------------------------
// 6. Commit evidence is checked against the receiver's own threshold
// ---------------------------------------------------------------------------

#[tokio::test]
async fn peer_commit_needs_valid_evidence() {
    let node_a = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    deliver(&node_a, signed_deliver(&alice, &bob, b"evidence", 1_700_000_000)).await;
    proposer_for(&node_a).run_round().await.expect("round runs");
    let block = node_a
        .state
        .blocks
        .get_block(0)
        .expect("read")
        .expect("present");
    let hash = block_hash(&block);

    let node_b = test_node(2);

    // No receipts at all: refused.
    let response = apply_committed_block(&node_b.state, &block, &[])
        .await
        .expect("handled");
    assert!(!response.committed);
    assert_eq!(node_b.state.blocks.block_count().expect("count"), 0);

    // A receipt signed by a key that does not match its claimed voter:
    // still refused.
    let (mallory, _) = client_keypair(66);
    let forged = VoteReceipt {
        voter: node_a.state.address.clone(),
        signature: sign_message(hash.as_bytes(), &mallory.private),
    };
    let response = apply_committed_block(&node_b.state, &block, &[forged])
        .await
        .expect("handled");
    assert!(!response.committed);

    // A genuine receipt from node A meets node B's solo threshold of one.
    let genuine = VoteReceipt {
        voter: node_a.state.address.clone(),
        signature: sign_message(hash.as_bytes(), &node_a.state.keypair.private),
    };
    let response = apply_committed_block(&node_b.state, &block, &[genuine])
        .await
        .expect("handled");
    assert!(response.committed);
    assert_eq!(response.height, Some(0));
    assert_eq!(node_b.state.blocks.block_count().expect("count"), 1);
}

// ---------------------------------------------------------------------------
// 7. Duplicate delivery is acknowledged, not duplicated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redelivery_is_idempotent_across_the_pipeline() {
    let node = test_node(1);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    let request = signed_deliver(&alice, &bob, b"say it once", 1_700_000_000);
    let first = deliver(&node, request.clone()).await;
    assert!(!first.duplicate);

    proposer_for(&node).run_round().await.expect("round runs");

    // Redelivering an already committed message changes nothing.
    let second = deliver(&node, request).await;
    assert!(second.duplicate);
    assert_eq!(second.cid, first.cid);

    assert_eq!(node.state.messages.message_count().expect("count"), 1);
    assert_eq!(node.state.blocks.block_count().expect("count"), 1);

    let outcome = proposer_for(&node).run_round().await.expect("round runs");
    assert_eq!(outcome, ProposalOutcome::Idle);
}

// ---------------------------------------------------------------------------
// 8. Conflicting blocks at a settled height: at most one wins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflicting_block_at_committed_height_is_refused() {
    let node_a = test_node(1);
    let node_b = test_node(2);
    let (alice, _) = client_keypair(10);
    let (_, bob) = client_keypair(11);

    // Each node commits a genesis of its own over different messages, so
    // the two chains disagree at height 0.
    deliver(&node_a, signed_deliver(&alice, &bob, b"seen by a", 1_700_000_000)).await;
    proposer_for(&node_a).run_round().await.expect("a commits");
    deliver(&node_b, signed_deliver(&alice, &bob, b"seen by b", 1_700_000_000)).await;
    proposer_for(&node_b).run_round().await.expect("b commits");

    let ours = node_a
        .state
        .blocks
        .get_block(0)
        .expect("read")
        .expect("present");
    let theirs = node_b
        .state
        .blocks
        .get_block(0)
        .expect("read")
        .expect("present");
    assert_ne!(block_hash(&ours), block_hash(&theirs));

    // Node B pushes its block to node A with a perfectly genuine receipt.
    // The height is already settled on A's chain, so the sibling is refused.
    let receipt = VoteReceipt {
        voter: node_b.state.address.clone(),
        signature: sign_message(
            block_hash(&theirs).as_bytes(),
            &node_b.state.keypair.private,
        ),
    };
    let response = apply_committed_block(&node_a.state, &theirs, &[receipt])
        .await
        .expect("handled");
    assert!(!response.committed);

    // Re-observing the block A already holds is acknowledged, not refused.
    let receipt = VoteReceipt {
        voter: node_a.state.address.clone(),
        signature: sign_message(block_hash(&ours).as_bytes(), &node_a.state.keypair.private),
    };
    let response = apply_committed_block(&node_a.state, &ours, &[receipt])
        .await
        .expect("handled");
    assert!(response.committed);
    assert_eq!(response.height, Some(0));

    let tip = node_a.state.blocks.tip().expect("tip").expect("present");
    assert_eq!(block_hash(&tip), block_hash(&ours));
    assert_eq!(node_a.state.blocks.block_count().expect("count"), 1);
}
