// Pure reward-schedule oracles, keyed by (height, network). No I/O.
//
// The distilled spec leaves the exact schedule as domain data. The
// `byzantiumHardForkHeight = 0` constant it points to suggests these
// constants were once flattened for a non-Ethereum fork; here the fork
// heights live on `Network` so they're configuration, not logic.

use num_bigint::BigInt;

const WEI_PER_ETHER: i64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

/// Fork-height boundaries for a network's reward schedule.
#[derive(Debug, Clone, Copy)]
pub struct ForkHeights {
    pub byzantium: u64,
    pub constantinople: u64,
}

impl Network {
    fn fork_heights(self) -> ForkHeights {
        match self {
            Network::Main => ForkHeights {
                byzantium: 4_370_000,
                constantinople: 7_280_000,
            },
            // Flat regtest-style schedule: forks active from genesis so
            // integration tests never need production-scale heights.
            Network::Test => ForkHeights {
                byzantium: 0,
                constantinople: 0,
            },
        }
    }
}

pub trait RewardTables: Send + Sync {
    fn block_reward(&self, height: u64, network: Network) -> BigInt;
    fn uncle_inclusion_reward(&self, height: u64, network: Network) -> BigInt;
    fn uncle_reward(&self, uncle_height: u64, block_height: u64, network: Network) -> BigInt;
}

/// Ethash-style disinflating schedule: 5 ETH pre-Byzantium, 3 ETH from
/// Byzantium, 2 ETH from Constantinople. Uncle-inclusion reward is
/// `block_reward / 32` per included uncle; uncle reward scales down by
/// `(8 - (block_height - uncle_height)) / 8` of the block reward,
/// clamped to zero when the inclusion distance exceeds 8 (the caller
/// additionally clamps any negative result per spec).
#[derive(Debug, Default, Clone, Copy)]
pub struct EthashRewardTables;

impl EthashRewardTables {
    fn base_reward(height: u64, network: Network) -> BigInt {
        let forks = network.fork_heights();
        if height >= forks.constantinople {
            BigInt::from(2) * BigInt::from(WEI_PER_ETHER)
        } else if height >= forks.byzantium {
            BigInt::from(3) * BigInt::from(WEI_PER_ETHER)
        } else {
            BigInt::from(5) * BigInt::from(WEI_PER_ETHER)
        }
    }
}

impl RewardTables for EthashRewardTables {
    fn block_reward(&self, height: u64, network: Network) -> BigInt {
        Self::base_reward(height, network)
    }

    fn uncle_inclusion_reward(&self, height: u64, network: Network) -> BigInt {
        Self::base_reward(height, network) / BigInt::from(32)
    }

    fn uncle_reward(&self, uncle_height: u64, block_height: u64, network: Network) -> BigInt {
        let base = Self::base_reward(block_height, network);
        let distance = block_height.saturating_sub(uncle_height) as i64;
        // (8 - distance) * base / 8; negative when distance > 8, the
        // caller (handle_uncle) clamps that to zero per spec.
        (BigInt::from(8 - distance) * base) / BigInt::from(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_byzantium_reward_is_five_ether() {
        let tables = EthashRewardTables;
        assert_eq!(
            tables.block_reward(100, Network::Main),
            BigInt::from(5) * BigInt::from(WEI_PER_ETHER)
        );
    }

    #[test]
    fn test_network_is_flat_two_ether() {
        let tables = EthashRewardTables;
        assert_eq!(
            tables.block_reward(100, Network::Test),
            BigInt::from(2) * BigInt::from(WEI_PER_ETHER)
        );
    }

    #[test]
    fn uncle_inclusion_is_one_thirty_second_of_block_reward() {
        let tables = EthashRewardTables;
        let block_reward = tables.block_reward(4_500_000, Network::Main);
        assert_eq!(
            tables.uncle_inclusion_reward(4_500_000, Network::Main),
            &block_reward / BigInt::from(32)
        );
    }

    #[test]
    fn uncle_reward_decreases_with_inclusion_distance() {
        let tables = EthashRewardTables;
        let close = tables.uncle_reward(500, 501, Network::Main);
        let far = tables.uncle_reward(492, 500, Network::Main);
        assert!(close > far);
    }

    #[test]
    fn uncle_reward_can_go_negative_before_clamping() {
        // distance 9 at Constantinople-era (2 ETH base): (8-9)*2e18/8 < 0.
        let tables = EthashRewardTables;
        let r = tables.uncle_reward(496, 500 + 5_000_000, Network::Main);
        assert!(r < BigInt::from(0));
    }
}
