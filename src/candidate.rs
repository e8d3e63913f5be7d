// Candidate and RoundShares domain types.
//
// A `Candidate` is the pool's record of a share believed to have found a
// block. It is mutated exactly twice in its lifetime: once by
// `unlock_pending` (transition to Immature or Orphan) and, for blocks that
// survive, once more by `unlock_and_credit` (transition to Matured or
// Orphan). After a terminal state it is never written again.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CandidateState {
    /// Pass 1 has not yet confirmed this candidate against the chain.
    Pending = 0,
    /// Confirmed on-chain, waiting out `depth` confirmations.
    Immature = 1,
    /// `depth` confirmations reached; reward is final.
    Matured = 2,
    /// No confirming block or uncle was found in the matching window.
    Orphan = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Height the pool believed it was mining against at share time.
    /// Reference only — `height` below is authoritative once matched.
    pub round_height: u64,
    /// Authoritative chain height after matching (equals `round_height`
    /// until the matcher runs).
    pub height: u64,
    /// Hex-encoded nonce the miner submitted.
    pub nonce: String,
    pub pow_hash: String,
    pub mix_digest: String,
    pub timestamp: u64,
    pub difficulty: u64,
    pub total_shares: u64,
    /// Empty until matched to a block or uncle.
    pub hash: String,
    /// 0 if this candidate is not an uncle.
    pub uncle_height: u64,
    pub orphan: bool,
    pub reward: BigInt,
    pub extra_reward: Option<BigInt>,
    pub state: CandidateState,
}

impl Candidate {
    pub fn new(round_height: u64, nonce: impl Into<String>) -> Self {
        Candidate {
            round_height,
            height: round_height,
            nonce: nonce.into(),
            pow_hash: String::new(),
            mix_digest: String::new(),
            timestamp: 0,
            difficulty: 0,
            total_shares: 0,
            hash: String::new(),
            uncle_height: 0,
            orphan: false,
            reward: BigInt::from(0),
            extra_reward: None,
            state: CandidateState::Pending,
        }
    }

    /// The `(round_height, nonce)` key under which this candidate's round
    /// shares are filed in the `ShareStore`.
    pub fn round_key(&self) -> (u64, &str) {
        (self.round_height, &self.nonce)
    }

    pub fn is_uncle(&self) -> bool {
        self.uncle_height != 0
    }
}

/// Per-round contribution map: `miner_id -> share_count`. Immutable once
/// the round closes; the unlocker only reads it.
pub type RoundShares = HashMap<String, u64>;
