// Error types for the unlocker core.
//
// Every variant maps to one row of the error-kind table: transport,
// decode, store-read/write, schedule-config. "No shares" is deliberately
// not an error variant here — it is a data outcome threaded through
// `RewardOutcome`, not a failure.

#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("chain RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chain RPC returned an error response: {0}")]
    Rpc(String),
    #[error("expected a block at height {0} but node returned null")]
    MissingBlock(u64),
    #[error("failed to decode hex field {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("invalid hex digits: {0}")]
    InvalidHex(#[from] std::num::ParseIntError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("depth must be >= {min} (got {got})")]
    DepthTooShallow { min: u64, got: u64 },
    #[error("immature_depth must be >= {min} (got {got})")]
    ImmatureDepthTooShallow { min: u64, got: u64 },
    #[error("depth must be >= 2 * minDepth ({min}); got depth={depth}, immature_depth={immature_depth}")]
    DepthRatioViolated {
        min: u64,
        depth: u64,
        immature_depth: u64,
    },
    #[error("daemon URL must not be empty")]
    EmptyDaemon,
    #[error("pool_fee must be in [0, 100); got {0}")]
    PoolFeeOutOfRange(f64),
    #[error("invalid interval duration: {0}")]
    InvalidInterval(#[from] humantime::DurationError),
}

/// The error kind that fires during a pass: `pending-block` for Pass 1,
/// `matured-block` for Pass 2. Carried alongside the halt cause so logs
/// can tag which pass tripped it, per the Observability surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    PendingBlock,
    MaturedBlock,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassKind::PendingBlock => write!(f, "pending-block"),
            PassKind::MaturedBlock => write!(f, "matured-block"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("[{pass}] {source}")]
    Chain {
        pass: PassKind,
        #[source]
        source: ChainClientError,
    },
    #[error("[{pass}] {source}")]
    Store {
        pass: PassKind,
        #[source]
        source: StoreError,
    },
}
