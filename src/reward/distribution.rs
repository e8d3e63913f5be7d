// Reward apportionment: charge_fee, calculate_rewards, and the
// RewardDistribution result type. All arithmetic is exact rational until
// the single wei -> Shannon truncation at the end.

use num_bigint::BigInt;
use num_rational::BigRational;
use std::collections::HashMap;

use crate::candidate::{Candidate, RoundShares};
use crate::units::rational_wei_to_shannon;

/// Converts a percentage given as a decimal literal (e.g. `1.0`, `10.0`,
/// `2.5`) into an exact rational fraction, using the value's decimal
/// string representation rather than its binary float bit pattern — a
/// config-supplied `1.0` must mean exactly `1/100`, not the nearest
/// double to it, or per-miner floor divisions drift by a Shannon.
fn percent_to_rational(percent: f64) -> BigRational {
    let s = format!("{percent}");
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    let negative = whole.starts_with('-');
    let digits: String = format!("{whole}{frac}")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let numerator: BigInt = digits.parse().unwrap_or_else(|_| BigInt::from(0));
    let numerator = if negative { -numerator } else { numerator };
    let denominator = BigInt::from(10u64).pow(frac.len() as u32) * BigInt::from(100);
    BigRational::new(numerator, denominator)
}

/// `chargeFee(v, p) = (v - v*p/100, v*p/100)`.
pub fn charge_fee(value: &BigRational, percent: f64) -> (BigRational, BigRational) {
    let percent_r = percent_to_rational(percent);
    let fee = value * &percent_r;
    let remainder = value - &fee;
    (remainder, fee)
}

#[derive(Debug, Clone)]
pub struct RewardDistribution {
    pub revenue: BigRational,
    pub miners_profit: BigRational,
    pub pool_profit: BigRational,
    pub rewards: HashMap<String, BigInt>,
    pub percents: HashMap<String, BigRational>,
}

/// Outcome of computing rewards for one matured candidate: either a full
/// distribution, or the "no shares" data condition (§4.5.3 step 3),
/// which is non-fatal and signals the caller to write an
/// `unable-to-credit` marker instead of credits.
pub enum RewardOutcome {
    Distribution(RewardDistribution),
    NoShares,
}

pub struct RewardParams<'a> {
    pub pool_fee_pct: f64,
    pub pool_fee_address: Option<&'a str>,
    pub donate: bool,
    pub donate_pct: f64,
    pub donation_account: &'a str,
}

/// Computes the reward distribution for a matured candidate given its
/// round's shares. Mirrors §4.5.3 step by step.
pub fn calculate_rewards(
    candidate: &Candidate,
    shares: &RoundShares,
    params: &RewardParams,
) -> RewardOutcome {
    // Step 1: revenue := c.reward
    let mut revenue = BigRational::from_integer(candidate.reward.clone());

    // Step 2: chargeFee(revenue, pool_fee_pct)
    let (miners_profit, mut pool_profit) = charge_fee(&revenue, params.pool_fee_pct);

    // Step 3: fetch round shares; empty map is the non-fatal sentinel.
    if shares.is_empty() {
        return RewardOutcome::NoShares;
    }

    // Step 4: total shares
    let total: u64 = shares.values().sum();
    let total_r = BigRational::from_integer(BigInt::from(total));

    // Step 5: per-miner percent and floor(miners_profit * percent / 1e9)
    let mut percents = HashMap::with_capacity(shares.len());
    let mut rewards = HashMap::with_capacity(shares.len());
    for (miner, n) in shares {
        let percent = BigRational::from_integer(BigInt::from(*n)) / &total_r;
        let share_wei = &miners_profit * &percent;
        rewards.insert(miner.clone(), rational_wei_to_shannon(&share_wei));
        percents.insert(miner.clone(), percent);
    }

    // Step 6: fold extra_reward (tx fees kept separate) into pool profit
    // and revenue.
    if let Some(extra) = &candidate.extra_reward {
        let extra_r = BigRational::from_integer(extra.clone());
        pool_profit += &extra_r;
        revenue += &extra_r;
    }

    // Step 7: donation carve-out from pool profit.
    if params.donate {
        let (new_pool_profit, donation) = charge_fee(&pool_profit, params.donate_pct);
        pool_profit = new_pool_profit;
        let donation_shannon = rational_wei_to_shannon(&donation);
        let key = params.donation_account.to_lowercase();
        *rewards.entry(key).or_insert_with(|| BigInt::from(0)) += donation_shannon;
    }

    // Step 8: credit pool_fee_address with the remaining pool profit.
    if let Some(addr) = params.pool_fee_address {
        if !addr.is_empty() {
            let pool_shannon = rational_wei_to_shannon(&pool_profit);
            let key = addr.to_lowercase();
            *rewards.entry(key).or_insert_with(|| BigInt::from(0)) += pool_shannon;
        }
    }

    RewardOutcome::Distribution(RewardDistribution {
        revenue,
        miners_profit,
        pool_profit,
        rewards,
        percents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateState;

    fn candidate_with_reward(wei: i64) -> Candidate {
        let mut c = Candidate::new(1, "0x1");
        c.reward = BigInt::from(wei);
        c.state = CandidateState::Matured;
        c
    }

    #[test]
    fn reward_split_matches_literal_scenario() {
        // Scenario 5: reward=1e18 wei, pool_fee=1%, shares A:70 B:30,
        // donate=false, pool_fee_address="0xfee".
        let candidate = candidate_with_reward(1_000_000_000_000_000_000);
        let mut shares = RoundShares::new();
        shares.insert("A".to_string(), 70);
        shares.insert("B".to_string(), 30);
        let params = RewardParams {
            pool_fee_pct: 1.0,
            pool_fee_address: Some("0xfee"),
            donate: false,
            donate_pct: 10.0,
            donation_account: "0xdonate",
        };

        let outcome = calculate_rewards(&candidate, &shares, &params);
        let dist = match outcome {
            RewardOutcome::Distribution(d) => d,
            RewardOutcome::NoShares => panic!("expected a distribution"),
        };

        assert_eq!(dist.rewards["0xfee"], BigInt::from(10_000_000i64));
        assert_eq!(dist.rewards["A"], BigInt::from(693_000_000i64));
        assert_eq!(dist.rewards["B"], BigInt::from(297_000_000i64));
    }

    #[test]
    fn no_shares_returns_sentinel() {
        let candidate = candidate_with_reward(1_000_000_000_000_000_000);
        let shares = RoundShares::new();
        let params = RewardParams {
            pool_fee_pct: 1.0,
            pool_fee_address: None,
            donate: false,
            donate_pct: 10.0,
            donation_account: "0xdonate",
        };
        assert!(matches!(
            calculate_rewards(&candidate, &shares, &params),
            RewardOutcome::NoShares
        ));
    }

    #[test]
    fn donation_is_carved_from_pool_profit() {
        let candidate = candidate_with_reward(1_000_000_000_000_000_000);
        let mut shares = RoundShares::new();
        shares.insert("A".to_string(), 1);
        let params = RewardParams {
            pool_fee_pct: 1.0,
            pool_fee_address: Some("0xfee"),
            donate: true,
            donate_pct: 10.0,
            donation_account: "0xDonate",
        };
        let outcome = calculate_rewards(&candidate, &shares, &params);
        let dist = match outcome {
            RewardOutcome::Distribution(d) => d,
            RewardOutcome::NoShares => panic!("expected a distribution"),
        };
        // donation account key is lowercased
        assert!(dist.rewards.contains_key("0xdonate"));
        assert!(dist.rewards["0xdonate"] > BigInt::from(0));
        assert!(dist.rewards["0xfee"] > BigInt::from(0));
    }

    #[test]
    fn extra_reward_folds_into_pool_profit_and_revenue() {
        let mut candidate = candidate_with_reward(1_000_000_000_000_000_000);
        candidate.extra_reward = Some(BigInt::from(500_000_000_000_000_000i64));
        let mut shares = RoundShares::new();
        shares.insert("A".to_string(), 1);
        let params = RewardParams {
            pool_fee_pct: 1.0,
            pool_fee_address: None,
            donate: false,
            donate_pct: 10.0,
            donation_account: "0xdonate",
        };
        let outcome = calculate_rewards(&candidate, &shares, &params);
        let dist = match outcome {
            RewardOutcome::Distribution(d) => d,
            RewardOutcome::NoShares => panic!("expected a distribution"),
        };
        assert_eq!(
            dist.revenue,
            BigRational::from_integer(BigInt::from(1_500_000_000_000_000_000i64))
        );
    }
}
