// Candidate-to-chain matcher: searches the confirmation window around a
// candidate's recorded height for a confirming block or uncle, and
// applies the reward-assignment handlers (§4.4, §4.5.1, §4.5.2).

use num_bigint::BigInt;
use num_traits::Zero;

use crate::candidate::Candidate;
use crate::chain::{types::hex_eq_fold, Block, ChainClient, Uncle};
use crate::error::ChainClientError;
use crate::reward::tables::{Network, RewardTables};

/// Candidates are searched in the window `[height - MATCH_RADIUS,
/// height + MATCH_RADIUS)`, tolerating drift between the height the pool
/// recorded at share time and the height the node later assigned.
pub const MATCH_RADIUS: i64 = 16;

#[derive(Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Block,
    Uncle,
    Orphan,
}

/// Checks whether chain block `b` is the block that candidate `c` found,
/// per the three-step predicate in §4.4.
fn matches(candidate: &Candidate, block: &Block) -> bool {
    if !candidate.hash.is_empty() {
        return hex_eq_fold(&candidate.hash, &block.hash);
    }
    if !block.nonce.is_empty() {
        return hex_eq_fold(&block.nonce, &candidate.nonce);
    }
    if block.seal_fields.len() == 2 {
        return hex_eq_fold(&candidate.nonce, &block.seal_fields[1]);
    }
    false
}

/// `handleBlock(B, c)` — §4.5.1.
pub async fn handle_block(
    chain: &dyn ChainClient,
    rewards: &dyn RewardTables,
    network: Network,
    keep_tx_fees: bool,
    block: &Block,
    candidate: &mut Candidate,
) -> Result<(), ChainClientError> {
    let height = crate::chain::types::hex_to_u64(&block.number).map_err(|source| {
        ChainClientError::Decode {
            field: "number",
            source,
        }
    })?;
    candidate.height = height;

    let mut base = rewards.block_reward(height, network);

    let mut extra = BigInt::zero();
    for tx in &block.transactions {
        let receipt = chain
            .get_tx_receipt(&tx.hash)
            .await?
            .ok_or(ChainClientError::MissingBlock(height))?;
        let gas_used = crate::chain::types::hex_to_u64(&receipt.gas_used).map_err(|source| {
            ChainClientError::Decode {
                field: "gasUsed",
                source,
            }
        })?;
        let gas_price = crate::chain::types::hex_to_u64(&tx.gas_price).map_err(|source| {
            ChainClientError::Decode {
                field: "gasPrice",
                source,
            }
        })?;
        extra += BigInt::from(gas_used) * BigInt::from(gas_price);
    }

    if keep_tx_fees {
        candidate.extra_reward = Some(extra);
    } else {
        base += extra;
    }

    let uncle_inclusion =
        rewards.uncle_inclusion_reward(height, network) * BigInt::from(block.uncles.len());

    candidate.reward = base + uncle_inclusion;
    candidate.hash = block.hash.clone();
    candidate.orphan = false;
    candidate.uncle_height = 0;
    Ok(())
}

/// `handleUncle(h, U, c)` — §4.5.2.
pub fn handle_uncle(
    rewards: &dyn RewardTables,
    network: Network,
    height: u64,
    uncle: &Uncle,
    candidate: &mut Candidate,
) -> Result<(), ChainClientError> {
    let uncle_height =
        crate::chain::types::hex_to_u64(&uncle.number).map_err(|source| ChainClientError::Decode {
            field: "number",
            source,
        })?;
    let mut r = rewards.uncle_reward(uncle_height, height, network);
    if r < BigInt::zero() {
        r = BigInt::zero();
    }
    candidate.height = height;
    candidate.uncle_height = uncle_height;
    candidate.hash = uncle.hash.clone();
    candidate.reward = r;
    candidate.orphan = false;
    Ok(())
}

/// Runs the matcher for a single candidate: searches
/// `[c.height - 16, c.height + 16)` for a confirming block or uncle, in
/// ascending height order, applying the relevant handler on first match.
/// Marks the candidate orphan if the window is exhausted without one.
pub async fn match_candidate(
    chain: &dyn ChainClient,
    rewards: &dyn RewardTables,
    network: Network,
    keep_tx_fees: bool,
    candidate: &mut Candidate,
) -> Result<MatchOutcome, ChainClientError> {
    let start = candidate.height as i64 - MATCH_RADIUS;

    for offset in 0..(2 * MATCH_RADIUS) {
        let h = start + offset;
        if h < 0 {
            continue;
        }
        let h = h as u64;

        let block = match chain.get_block_by_height(h).await? {
            Some(b) => b,
            None => return Err(ChainClientError::MissingBlock(h)),
        };

        if matches(candidate, &block) {
            handle_block(chain, rewards, network, keep_tx_fees, &block, candidate).await?;
            return Ok(MatchOutcome::Block);
        }

        for i in 0..block.uncles.len() as u64 {
            let uncle = match chain.get_uncle_by_block_number_and_index(h, i).await? {
                Some(u) => u,
                None => return Err(ChainClientError::MissingBlock(h)),
            };
            if matches(candidate, &uncle) {
                handle_uncle(rewards, network, h, &uncle, candidate)?;
                return Ok(MatchOutcome::Uncle);
            }
        }
    }

    candidate.orphan = true;
    Ok(MatchOutcome::Orphan)
}
