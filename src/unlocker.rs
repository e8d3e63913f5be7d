// The periodic unlocker: drives Pass 1 (`unlock_pending`, immature
// promotion) then Pass 2 (`unlock_and_credit`, matured promotion) on every
// tick, strictly sequentially on one worker. `halt` is sticky — once any
// pass fails with a transport/decode/store error, every later tick
// short-circuits until the process restarts. Reward movement is
// money-movement code: partial progress on an unknown error is worse than
// a paused unlocker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigInt;
use tokio::sync::watch;

use crate::candidate::Candidate;
use crate::chain::ChainClient;
use crate::config::UnlockerConfig;
use crate::error::{ChainClientError, ConfigError, PassKind, StoreError, UnlockError};
use crate::matcher::{match_candidate, MatchOutcome};
use crate::reward::distribution::{calculate_rewards, RewardOutcome, RewardParams};
use crate::reward::tables::{Network, RewardTables};
use crate::store::{CandidateStore, ShareStore};

/// Confirmations enforced as minima at construction (§3 invariants):
/// `depth >= 2*MIN_DEPTH` and `immature_depth >= MIN_DEPTH`.
pub const MIN_DEPTH: u64 = 16;

/// Errcode recorded when Pass 1 cannot credit a matured candidate because
/// its round has no recorded shares.
const ERRCODE_NO_SHARES_PENDING: u8 = 1;
/// Errcode for the same condition encountered in Pass 2.
const ERRCODE_NO_SHARES_MATURED: u8 = 2;

pub struct Unlocker {
    chain: Arc<dyn ChainClient>,
    candidates: Arc<dyn CandidateStore>,
    shares: Arc<dyn ShareStore>,
    reward_tables: Arc<dyn RewardTables>,
    network: Network,
    enabled: bool,
    depth: u64,
    immature_depth: u64,
    interval: Duration,
    keep_tx_fees: bool,
    reward_params_pool_fee: f64,
    pool_fee_address: Option<String>,
    donate: bool,
    donate_pct: f64,
    donation_account: String,
    halt: bool,
    last_fail: Option<String>,
}

impl Unlocker {
    pub fn new(
        config: &UnlockerConfig,
        chain: Arc<dyn ChainClient>,
        candidates: Arc<dyn CandidateStore>,
        shares: Arc<dyn ShareStore>,
        reward_tables: Arc<dyn RewardTables>,
    ) -> Result<Self, ConfigError> {
        if config.immature_depth < MIN_DEPTH {
            return Err(ConfigError::ImmatureDepthTooShallow {
                min: MIN_DEPTH,
                got: config.immature_depth,
            });
        }
        if config.depth < MIN_DEPTH {
            return Err(ConfigError::DepthTooShallow {
                min: MIN_DEPTH,
                got: config.depth,
            });
        }
        if config.depth < 2 * MIN_DEPTH {
            return Err(ConfigError::DepthRatioViolated {
                min: 2 * MIN_DEPTH,
                depth: config.depth,
                immature_depth: config.immature_depth,
            });
        }

        Ok(Unlocker {
            chain,
            candidates,
            shares,
            reward_tables,
            network: config.network,
            enabled: config.enabled,
            depth: config.depth,
            immature_depth: config.immature_depth,
            interval: config.interval,
            keep_tx_fees: config.keep_tx_fees,
            reward_params_pool_fee: config.pool_fee,
            pool_fee_address: config.pool_fee_address.clone(),
            donate: config.donate,
            donate_pct: config.donate_percent,
            donation_account: config.donation_account.clone(),
            halt: false,
            last_fail: None,
        })
    }

    pub fn halted(&self) -> bool {
        self.halt
    }

    fn reward_params(&self) -> RewardParams<'_> {
        RewardParams {
            pool_fee_pct: self.reward_params_pool_fee,
            pool_fee_address: self.pool_fee_address.as_deref(),
            donate: self.donate,
            donate_pct: self.donate_pct,
            donation_account: &self.donation_account,
        }
    }

    /// Runs Pass 1 then Pass 2 once, respecting the sticky halt flag.
    /// Used both for the initial immediate pass pair on startup and for
    /// `--once` CLI invocations.
    pub async fn tick(&mut self) {
        if self.check_halted() {
            return;
        }
        if let Err(err) = self.unlock_pending().await {
            self.fail(PassKind::PendingBlock, err);
            return;
        }
        if self.check_halted() {
            return;
        }
        if let Err(err) = self.unlock_and_credit().await {
            self.fail(PassKind::MaturedBlock, err);
        }
    }

    fn check_halted(&self) -> bool {
        if self.halt {
            tracing::warn!(
                last_fail = self.last_fail.as_deref().unwrap_or("unknown"),
                "Unlocking suspended due to last critical error"
            );
        }
        self.halt
    }

    fn fail(&mut self, pass: PassKind, err: UnlockError) {
        self.halt = true;
        self.last_fail = Some(err.to_string());
        tracing::error!(pass = %pass, error = %err, "unlocker pass failed, halting");
    }

    /// Drives the periodic loop: an immediate pass pair, then ticks every
    /// `interval`, until `shutdown` reports true. Shutdown is serviced
    /// only between ticks — no pass is ever cancelled mid-flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if !self.enabled {
            tracing::info!("unlocker disabled, not scheduling");
            return;
        }

        tracing::info!(interval = ?self.interval, "unlocker starting");
        self.tick().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // interval fires immediately; the line above already ran that pass.

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("unlocker received shutdown signal, draining");
                        break;
                    }
                }
            }
        }
    }

    /// Pass 1 (§4.2): promote confirmed candidates to `immature`.
    async fn unlock_pending(&mut self) -> Result<(), UnlockError> {
        let pass = PassKind::PendingBlock;
        let pending_height = self
            .chain
            .get_pending_height()
            .await
            .map_err(|source| UnlockError::Chain { pass, source })?;
        let threshold = pending_height.saturating_sub(self.immature_depth);

        let mut candidates = self
            .candidates
            .get_candidates(threshold)
            .await
            .map_err(|source| UnlockError::Store { pass, source })?;

        let (matured, orphans) = self.match_all(pass, &mut candidates).await?;

        if !orphans.is_empty() {
            self.candidates
                .write_pending_orphans(&orphans)
                .await
                .map_err(|source| UnlockError::Store { pass, source })?;
        }

        tracing::info!(
            pass = %pass,
            block_count = matured.len(),
            orphan_count = orphans.len(),
            "IMMATURE SESSION"
        );

        for candidate in &matured {
            self.credit_matured_candidate(pass, candidate, ERRCODE_NO_SHARES_PENDING, true)
                .await?;
        }
        Ok(())
    }

    /// Pass 2 (§4.3): promote immature candidates deep enough to be final.
    async fn unlock_and_credit(&mut self) -> Result<(), UnlockError> {
        let pass = PassKind::MaturedBlock;
        let pending_height = self
            .chain
            .get_pending_height()
            .await
            .map_err(|source| UnlockError::Chain { pass, source })?;
        let threshold = pending_height.saturating_sub(self.depth);

        let mut candidates = self
            .candidates
            .get_immature_blocks(threshold)
            .await
            .map_err(|source| UnlockError::Store { pass, source })?;

        let (matured, orphans) = self.match_all(pass, &mut candidates).await?;

        if !orphans.is_empty() {
            self.candidates
                .write_pending_orphans(&orphans)
                .await
                .map_err(|source| UnlockError::Store { pass, source })?;
        }

        tracing::info!(
            pass = %pass,
            block_count = matured.len(),
            orphan_count = orphans.len(),
            "MATURED SESSION"
        );

        for candidate in &matured {
            self.credit_matured_candidate(pass, candidate, ERRCODE_NO_SHARES_MATURED, false)
                .await?;
        }
        Ok(())
    }

    /// Runs the matcher over the whole working set, splitting it into
    /// matured (block- or uncle-matched) and orphaned candidates. Any
    /// transport/decode error from the matcher aborts the pass (§4.4
    /// step 4): a fatal error here halts rather than skipping the
    /// offending candidate.
    async fn match_all(
        &self,
        pass: PassKind,
        candidates: &mut [Candidate],
    ) -> Result<(Vec<Candidate>, Vec<Candidate>), UnlockError> {
        let mut matured = Vec::new();
        let mut orphans = Vec::new();

        for candidate in candidates.iter_mut() {
            let outcome = match_candidate(
                self.chain.as_ref(),
                self.reward_tables.as_ref(),
                self.network,
                self.keep_tx_fees,
                candidate,
            )
            .await
            .map_err(|source| UnlockError::Chain { pass, source })?;

            match outcome {
                MatchOutcome::Block | MatchOutcome::Uncle => matured.push(candidate.clone()),
                MatchOutcome::Orphan => orphans.push(candidate.clone()),
            }
        }

        Ok((matured, orphans))
    }

    /// Computes the reward distribution for one matured candidate and
    /// either writes its credits (immature or matured ledger, per `pass`)
    /// or, if the round has no recorded shares, writes the non-fatal
    /// "unable to credit" marker instead (§4.2 step 5 / §4.3).
    async fn credit_matured_candidate(
        &self,
        pass: PassKind,
        candidate: &Candidate,
        no_shares_errcode: u8,
        writing_immature: bool,
    ) -> Result<(), UnlockError> {
        let shares = self
            .shares
            .get_round_shares(candidate.round_height, &candidate.nonce)
            .await
            .map_err(|source| UnlockError::Store { pass, source })?;

        let outcome = calculate_rewards(candidate, &shares, &self.reward_params());

        let rewards: HashMap<String, BigInt> = match outcome {
            RewardOutcome::Distribution(dist) => {
                tracing::info!(
                    pass = %pass,
                    round_height = candidate.round_height,
                    height = candidate.height,
                    hash = %candidate.hash,
                    miner_count = dist.rewards.len(),
                    revenue = %dist.revenue,
                    miners_profit = %dist.miners_profit,
                    pool_profit = %dist.pool_profit,
                    "{}",
                    if writing_immature { "IMMATURE" } else { "MATURED" }
                );
                dist.rewards
            }
            RewardOutcome::NoShares => {
                let state = if writing_immature {
                    0
                } else {
                    candidate.state as u8
                };
                self.candidates
                    .write_immature_error(candidate, state, no_shares_errcode)
                    .await
                    .map_err(|source| UnlockError::Store { pass, source })?;
                return Ok(());
            }
        };

        if writing_immature {
            self.candidates
                .write_immature_block(candidate, &rewards)
                .await
        } else {
            self.candidates
                .write_matured_block(candidate, &rewards)
                .await
        }
        .map_err(|source| UnlockError::Store { pass, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::RoundShares;
    use crate::chain::Block;
    use crate::reward::tables::EthashRewardTables;
    use crate::store::SledCandidateStore;
    use crate::testutil::{FakeChainClient, FakeShareStore};
    use std::sync::atomic::{AtomicU64, Ordering};

    static CTR: AtomicU64 = AtomicU64::new(0);

    fn tmp_store() -> SledCandidateStore {
        let id = CTR.fetch_add(1, Ordering::SeqCst);
        let p =
            std::env::temp_dir().join(format!("unlocker_scheduler_{}_{}", std::process::id(), id));
        let _ = std::fs::remove_dir_all(&p);
        SledCandidateStore::open(&p).unwrap()
    }

    fn base_config() -> UnlockerConfig {
        UnlockerConfig {
            enabled: true,
            pool_fee: 1.0,
            pool_fee_address: Some("0xfee".to_string()),
            donate: false,
            donate_percent: 10.0,
            donation_account: "0xdonate".to_string(),
            depth: 32,
            immature_depth: 16,
            keep_tx_fees: false,
            interval: Duration::from_secs(60),
            daemon: "http://localhost:8545".to_string(),
            timeout: Duration::from_secs(10),
            network: Network::Test,
            store: crate::config::StoreConfig {
                backend: crate::config::StoreBackend::Sled,
                path: "unused-in-tests".to_string(),
            },
        }
    }

    #[test]
    fn rejects_depth_below_minimum() {
        let mut cfg = base_config();
        cfg.depth = 10;
        let err = Unlocker::new(
            &cfg,
            Arc::new(FakeChainClient::default()),
            Arc::new(tmp_store()),
            Arc::new(FakeShareStore::default()),
            Arc::new(EthashRewardTables),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DepthTooShallow { .. }));
    }

    #[test]
    fn rejects_depth_less_than_twice_min_depth() {
        let mut cfg = base_config();
        cfg.depth = 20; // >= MIN_DEPTH but < 2*MIN_DEPTH
        let err = Unlocker::new(
            &cfg,
            Arc::new(FakeChainClient::default()),
            Arc::new(tmp_store()),
            Arc::new(FakeShareStore::default()),
            Arc::new(EthashRewardTables),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DepthRatioViolated { .. }));
    }

    fn block(number_hex: &str, hash: &str, nonce: &str) -> Block {
        Block {
            number: number_hex.to_string(),
            hash: hash.to_string(),
            nonce: nonce.to_string(),
            seal_fields: vec![],
            uncles: vec![],
            transactions: vec![],
        }
    }

    #[tokio::test]
    async fn pass1_promotes_matured_candidate_to_immature_and_credits_miners() {
        let chain = FakeChainClient::default();
        for h in 0..100u64 {
            chain
                .blocks
                .lock()
                .unwrap()
                .entry(h)
                .or_insert_with(|| block(&format!("0x{h:x}"), "0xmismatch", "0xffff"));
        }
        chain
            .blocks
            .lock()
            .unwrap()
            .insert(50, block("0x32", "0xaaa", "0xABC"));
        *chain.pending_height.lock().unwrap() = 66; // 66 - immature_depth(16) = 50

        let share_store = FakeShareStore::default();
        let mut shares = RoundShares::new();
        shares.insert("miner-a".to_string(), 1);
        share_store.seed(50, "0xabc", shares);

        let store = tmp_store();
        let mut candidate = Candidate::new(50, "0xabc");
        candidate.height = 50;
        store.insert_candidate(&candidate).unwrap();
        // re-fetch mutability not needed; store owns the bytes already.
        let _ = &candidate;

        let cfg = base_config();
        let mut unlocker = Unlocker::new(
            &cfg,
            Arc::new(chain),
            Arc::new(store),
            Arc::new(share_store),
            Arc::new(EthashRewardTables),
        )
        .unwrap();

        unlocker.tick().await;
        assert!(!unlocker.halted());
    }

    #[tokio::test]
    async fn no_recorded_shares_does_not_halt() {
        let chain = FakeChainClient::default();
        for h in 0..100u64 {
            chain
                .blocks
                .lock()
                .unwrap()
                .entry(h)
                .or_insert_with(|| block(&format!("0x{h:x}"), "0xmismatch", "0xffff"));
        }
        chain
            .blocks
            .lock()
            .unwrap()
            .insert(50, block("0x32", "0xaaa", "0xABC"));
        *chain.pending_height.lock().unwrap() = 66;

        let store = tmp_store();
        let mut candidate = Candidate::new(50, "0xabc");
        candidate.height = 50;
        store.insert_candidate(&candidate).unwrap();

        let cfg = base_config();
        let mut unlocker = Unlocker::new(
            &cfg,
            Arc::new(chain),
            Arc::new(store),
            Arc::new(FakeShareStore::default()), // no shares seeded
            Arc::new(EthashRewardTables),
        )
        .unwrap();

        unlocker.tick().await;
        assert!(!unlocker.halted(), "no-shares must not be treated as fatal");
    }

    #[tokio::test]
    async fn chain_transport_error_sets_sticky_halt() {
        // Candidate references height 50 but the chain has nothing at
        // all in its matching window, and `get_pending_height` returns 0
        // by default, so `get_block_by_height` will hit heights the fake
        // never seeded - the fake returns `Ok(None)`, which the matcher
        // turns into a `MissingBlock` transport error.
        let chain = FakeChainClient::default();
        *chain.pending_height.lock().unwrap() = 66;

        let store = tmp_store();
        let mut candidate = Candidate::new(50, "0xabc");
        candidate.height = 50;
        store.insert_candidate(&candidate).unwrap();

        let cfg = base_config();
        let mut unlocker = Unlocker::new(
            &cfg,
            Arc::new(chain),
            Arc::new(store),
            Arc::new(FakeShareStore::default()),
            Arc::new(EthashRewardTables),
        )
        .unwrap();

        unlocker.tick().await;
        assert!(unlocker.halted());

        // Subsequent ticks must short-circuit without touching the chain
        // again (sticky halt).
        unlocker.tick().await;
        assert!(unlocker.halted());
    }
}
