// Process entrypoint: loads `unlocker.toml`, wires up the configured
// `ChainClient` and store backends, and drives the `Unlocker` either
// once (`--once`, for cron/systemd-oneshot invocation) or as a persistent
// daemon until a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use pool_unlocker::chain::RpcChainClient;
use pool_unlocker::config::{StoreBackend, UnlockerConfig};
use pool_unlocker::reward::tables::EthashRewardTables;
use pool_unlocker::shutdown::ShutdownCoordinator;
use pool_unlocker::store::{CandidateStore, SledCandidateStore, SledShareStore, SqliteCandidateStore};
use pool_unlocker::unlocker::Unlocker;

#[derive(Parser, Debug)]
#[command(name = "unlockerd", about = "Mining pool block-unlocker daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "unlocker.toml")]
    config: String,

    /// Run one immediate pass pair (unlock_pending + unlock_and_credit)
    /// and exit, instead of running the persistent daemon loop.
    #[arg(long)]
    once: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let config = match UnlockerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, config_path = %cli.config, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if !config.enabled {
        tracing::info!("unlocker disabled in configuration, exiting");
        return ExitCode::SUCCESS;
    }

    let chain = match RpcChainClient::new(config.daemon.clone(), config.timeout) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::error!(error = %err, "failed to construct chain client");
            return ExitCode::FAILURE;
        }
    };

    let candidate_store: Arc<dyn CandidateStore> = match config.store.backend {
        StoreBackend::Sled => match SledCandidateStore::open(&config.store.path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::error!(error = %err, "failed to open sled candidate store");
                return ExitCode::FAILURE;
            }
        },
        StoreBackend::Sqlite => match SqliteCandidateStore::open(&config.store.path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::error!(error = %err, "failed to open sqlite candidate store");
                return ExitCode::FAILURE;
            }
        },
    };

    // The share store is read-only from the unlocker's perspective and is
    // populated by the out-of-scope share-submission front-end; it lives
    // in the same sled database regardless of the candidate store backend
    // so both subsystems agree on where round shares are filed.
    let share_store: Arc<dyn pool_unlocker::store::ShareStore> = match SledShareStore::open(&config.store.path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open share store");
            return ExitCode::FAILURE;
        }
    };

    let unlocker = match Unlocker::new(
        &config,
        chain,
        candidate_store,
        share_store,
        Arc::new(EthashRewardTables),
    ) {
        Ok(unlocker) => unlocker,
        Err(err) => {
            tracing::error!(error = %err, "invalid unlocker configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        let mut unlocker = unlocker;
        unlocker.tick().await;
        return if unlocker.halted() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    let (coordinator, shutdown_rx) = ShutdownCoordinator::new();
    let shutdown_task = tokio::spawn(coordinator.listen());
    unlocker.run(shutdown_rx).await;
    let _ = shutdown_task.await;

    ExitCode::SUCCESS
}
