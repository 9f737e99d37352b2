//! Consensus — majority voting over proposed message blocks.
//!
//! A proposer bundles pending cids into a Merkle-rooted block, peers
//! validate it against their own chain view, and the block commits once
//! `ceil(majority_bps × N / 10000)` distinct nodes have signed its hash.
//! There is no fork choice: a proposal that does not extend the local tip
//! is rejected by continuity and that is the whole resolution protocol.
//!
//! ## Module overview
//!
//! - [`validation`] — fixed-order proposal checks against a [`ChainView`].
//! - [`round`] — vote round state machine (Open → Settled/Expired) and
//!   commit-evidence verification.
//! - [`quorum`] — the ceiling majority threshold.

pub mod quorum;
pub mod round;
pub mod validation;

pub use quorum::{quorum_threshold, BPS_DENOMINATOR};
pub use round::{quorum_evidence_valid, RoundState, VoteOutcome, VoteRound};
pub use validation::{ChainView, ProposalValidator, RejectReason};
