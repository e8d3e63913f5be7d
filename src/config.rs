// `unlocker.toml` configuration: every option from SPEC_FULL §4.1's table,
// plus network selection, store backend selection, and logging
// verbosity. Deserialized with `serde`/`toml` and validated before any
// I/O — a malformed or out-of-range config is a startup error, never a
// panic (the "schedule-config" error kind of the error-handling design).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::reward::tables::Network;
use crate::unlocker::MIN_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sled,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: String,
}

/// The on-disk shape of `unlocker.toml`. `interval` and `timeout` are
/// human-readable duration strings (`"10m"`, `"30s"`), parsed with
/// `humantime` into `std::time::Duration` at load time rather than left
/// as raw seconds fields.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_true")]
    enabled: bool,
    pool_fee: f64,
    #[serde(default)]
    pool_fee_address: Option<String>,
    #[serde(default)]
    donate: bool,
    #[serde(default = "default_donate_percent")]
    donate_percent: f64,
    #[serde(default = "default_donation_account")]
    donation_account: String,
    depth: u64,
    immature_depth: u64,
    #[serde(default)]
    keep_tx_fees: bool,
    interval: String,
    daemon: String,
    #[serde(default = "default_timeout")]
    timeout: String,
    network: Network,
    store: StoreConfig,
    #[serde(default = "default_log_level")]
    #[allow(dead_code)]
    log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_donate_percent() -> f64 {
    10.0
}
fn default_donation_account() -> String {
    String::new()
}
fn default_timeout() -> String {
    "10s".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved, validated configuration the rest of the crate consumes.
/// Unlike `RawConfig`, durations are already `std::time::Duration`.
#[derive(Debug, Clone)]
pub struct UnlockerConfig {
    pub enabled: bool,
    pub pool_fee: f64,
    pub pool_fee_address: Option<String>,
    pub donate: bool,
    pub donate_percent: f64,
    pub donation_account: String,
    pub depth: u64,
    pub immature_depth: u64,
    pub keep_tx_fees: bool,
    pub interval: Duration,
    pub daemon: String,
    pub timeout: Duration,
    pub network: Network,
    pub store: StoreConfig,
}

impl UnlockerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        let config = UnlockerConfig {
            enabled: raw.enabled,
            pool_fee: raw.pool_fee,
            pool_fee_address: raw
                .pool_fee_address
                .filter(|addr| !addr.trim().is_empty()),
            donate: raw.donate,
            donate_percent: raw.donate_percent,
            donation_account: raw.donation_account,
            depth: raw.depth,
            immature_depth: raw.immature_depth,
            keep_tx_fees: raw.keep_tx_fees,
            interval: humantime::parse_duration(&raw.interval)?,
            daemon: raw.daemon,
            timeout: humantime::parse_duration(&raw.timeout)?,
            network: raw.network,
            store: raw.store,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.immature_depth < MIN_DEPTH {
            return Err(ConfigError::ImmatureDepthTooShallow {
                min: MIN_DEPTH,
                got: self.immature_depth,
            });
        }
        if self.depth < MIN_DEPTH {
            return Err(ConfigError::DepthTooShallow {
                min: MIN_DEPTH,
                got: self.depth,
            });
        }
        if self.depth < 2 * MIN_DEPTH {
            return Err(ConfigError::DepthRatioViolated {
                min: 2 * MIN_DEPTH,
                depth: self.depth,
                immature_depth: self.immature_depth,
            });
        }
        if self.daemon.trim().is_empty() {
            return Err(ConfigError::EmptyDaemon);
        }
        if !(0.0..100.0).contains(&self.pool_fee) {
            return Err(ConfigError::PoolFeeOutOfRange(self.pool_fee));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        pool_fee = 1.0
        pool_fee_address = "0xfee"
        depth = 32
        immature_depth = 16
        interval = "10m"
        daemon = "http://127.0.0.1:8545"
        network = "main"

        [store]
        backend = "sled"
        path = "/var/lib/unlocker/db"
    "#;

    #[test]
    fn parses_a_minimal_valid_config() {
        let cfg = UnlockerConfig::parse(VALID).unwrap();
        assert_eq!(cfg.depth, 32);
        assert_eq!(cfg.interval, Duration::from_secs(600));
        assert_eq!(cfg.network, Network::Main);
        assert_eq!(cfg.store.backend, StoreBackend::Sled);
    }

    #[test]
    fn rejects_depth_below_minimum() {
        let bad = VALID.replace("depth = 32", "depth = 10");
        assert!(matches!(
            UnlockerConfig::parse(&bad),
            Err(ConfigError::DepthTooShallow { .. })
        ));
    }

    #[test]
    fn rejects_depth_ratio_violation() {
        let bad = VALID.replace("depth = 32", "depth = 20");
        assert!(matches!(
            UnlockerConfig::parse(&bad),
            Err(ConfigError::DepthRatioViolated { .. })
        ));
    }

    #[test]
    fn rejects_empty_daemon() {
        let bad = VALID.replace(
            r#"daemon = "http://127.0.0.1:8545""#,
            r#"daemon = "   ""#,
        );
        assert!(matches!(
            UnlockerConfig::parse(&bad),
            Err(ConfigError::EmptyDaemon)
        ));
    }

    #[test]
    fn rejects_pool_fee_out_of_range() {
        let bad = VALID.replace("pool_fee = 1.0", "pool_fee = 100.0");
        assert!(matches!(
            UnlockerConfig::parse(&bad),
            Err(ConfigError::PoolFeeOutOfRange(_))
        ));
    }

    #[test]
    fn empty_pool_fee_address_means_retain_uncredited() {
        let cfg_text = VALID.replace(r#"pool_fee_address = "0xfee""#, r#"pool_fee_address = """#);
        let cfg = UnlockerConfig::parse(&cfg_text).unwrap();
        assert_eq!(cfg.pool_fee_address, None);
    }
}
