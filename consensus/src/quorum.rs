//! Majority quorum math.
//!
//! The voting population is the proposer itself plus every registered peer
//! that is not stale; stale peers drop out of the denominator so a
//! partitioned cluster can still make progress. The threshold is a ceiling,
//! never a rounding-down: 51% of 4 nodes means 3 accepts, not 2.

/// Denominator for basis-point fractions.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Votes required to commit: `ceil(total_nodes * majority_bps / 10000)`.
///
/// `total_nodes` counts the local node and its non-stale peers.
pub fn quorum_threshold(total_nodes: usize, majority_bps: u32) -> usize {
    let product = total_nodes as u64 * majority_bps as u64;
    ((product + BPS_DENOMINATOR - 1) / BPS_DENOMINATOR) as usize
}
