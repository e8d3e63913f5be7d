// CandidateStore and ShareStore: the persistent boundary of the unlocker
// core. Two interchangeable `CandidateStore` backends are provided (sled,
// an embedded KV store; sqlite, relational via rusqlite) — this resolves
// the distilled spec's Open Question about SQL vs KV by making them
// config-selected backends of one logical store rather than two stores
// kept in sync.
//
// Trees (sled) / tables (sqlite), one per relation:
//   candidates — (round_height, nonce) -> Candidate, any pipeline state
//   credits    — (pass, round_height, nonce, miner) -> Shannon amount
//   errors     — (round_height, nonce) -> (state, errcode)
//
// `credits` is additive: a miner's ledger entry is the sum of every
// credit ever written for them, never overwritten in place, mirroring
// how the out-of-scope payout sender expects to find a running balance.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use num_bigint::BigInt;
use rusqlite::OptionalExtension;

use crate::candidate::{Candidate, CandidateState, RoundShares};
use crate::error::StoreError;

/// Which pass wrote a credit: kept so immature and matured balances never
/// collide in the same ledger bucket even though they share a miner id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPass {
    Immature,
    Matured,
}

impl CreditPass {
    fn tree_suffix(self) -> &'static str {
        match self {
            CreditPass::Immature => "immature",
            CreditPass::Matured => "matured",
        }
    }
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get_candidates(&self, max_round_height: u64) -> Result<Vec<Candidate>, StoreError>;
    async fn get_immature_blocks(&self, max_height: u64) -> Result<Vec<Candidate>, StoreError>;
    async fn write_immature_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError>;
    async fn write_matured_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError>;
    async fn write_pending_orphans(&self, candidates: &[Candidate]) -> Result<(), StoreError>;
    async fn write_orphan(&self, candidate: &Candidate) -> Result<(), StoreError>;
    async fn write_immature_error(
        &self,
        candidate: &Candidate,
        state: u8,
        errcode: u8,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn get_round_shares(
        &self,
        round_height: u64,
        nonce: &str,
    ) -> Result<RoundShares, StoreError>;
}

fn candidate_key(candidate: &Candidate) -> Vec<u8> {
    round_key(candidate.round_height, &candidate.nonce)
}

fn round_key(round_height: u64, nonce: &str) -> Vec<u8> {
    let mut key = round_height.to_be_bytes().to_vec();
    key.push(0); // separator so no nonce prefix can collide across heights
    key.extend_from_slice(nonce.as_bytes());
    key
}

// ---------------------------------------------------------------------
// sled backend
// ---------------------------------------------------------------------

pub struct SledCandidateStore {
    candidates: sled::Tree,
    credits_immature: sled::Tree,
    credits_matured: sled::Tree,
    errors: sled::Tree,
}

impl SledCandidateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(SledCandidateStore {
            candidates: db.open_tree("candidates")?,
            credits_immature: db.open_tree("credits_immature")?,
            credits_matured: db.open_tree("credits_matured")?,
            errors: db.open_tree("errors")?,
        })
    }

    fn scan_candidates(
        &self,
        filter: impl Fn(&Candidate) -> bool,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut out = Vec::new();
        for entry in self.candidates.iter() {
            let (_, value) = entry?;
            let candidate: Candidate = serde_json::from_slice(&value)?;
            if filter(&candidate) {
                out.push(candidate);
            }
        }
        Ok(out)
    }

    /// Inserts or overwrites a candidate row as-is, including its current
    /// `state`. This is the write path the out-of-scope share-submission
    /// front-end uses to file a newly-created pending candidate; the
    /// `CandidateStore` trait itself exposes no such operation because the
    /// unlocker only ever reads and transitions existing rows.
    pub fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(candidate)?;
        self.candidates.insert(candidate_key(candidate), bytes)?;
        Ok(())
    }

    fn credit_tree(&self, pass: CreditPass) -> &sled::Tree {
        match pass {
            CreditPass::Immature => &self.credits_immature,
            CreditPass::Matured => &self.credits_matured,
        }
    }

    fn apply_credits(
        &self,
        pass: CreditPass,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let tree = self.credit_tree(pass);
        for (miner, amount) in rewards {
            let key = miner.as_bytes();
            let existing = match tree.get(key)? {
                Some(v) => serde_json::from_slice::<BigInt>(&v)?,
                None => BigInt::from(0),
            };
            let total = existing + amount;
            tree.insert(key, serde_json::to_vec(&total)?)?;
        }
        Ok(())
    }

    /// Reads back a miner's running balance for one pass. Exposed for
    /// tests and operational inspection; not part of the `CandidateStore`
    /// contract the unlocker itself needs.
    pub fn miner_balance(&self, pass: CreditPass, miner: &str) -> Result<BigInt, StoreError> {
        match self.credit_tree(pass).get(miner.as_bytes())? {
            Some(v) => Ok(serde_json::from_slice(&v)?),
            None => Ok(BigInt::from(0)),
        }
    }
}

#[async_trait]
impl CandidateStore for SledCandidateStore {
    async fn get_candidates(&self, max_round_height: u64) -> Result<Vec<Candidate>, StoreError> {
        self.scan_candidates(|c| {
            c.state == CandidateState::Pending && c.round_height <= max_round_height
        })
    }

    async fn get_immature_blocks(&self, max_height: u64) -> Result<Vec<Candidate>, StoreError> {
        self.scan_candidates(|c| c.state == CandidateState::Immature && c.height <= max_height)
    }

    async fn write_immature_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.state = CandidateState::Immature;
        self.insert_candidate(&stored)?;
        self.apply_credits(CreditPass::Immature, rewards)
    }

    async fn write_matured_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.state = CandidateState::Matured;
        self.insert_candidate(&stored)?;
        self.apply_credits(CreditPass::Matured, rewards)
    }

    async fn write_pending_orphans(&self, candidates: &[Candidate]) -> Result<(), StoreError> {
        for candidate in candidates {
            self.write_orphan(candidate).await?;
        }
        Ok(())
    }

    async fn write_orphan(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.orphan = true;
        stored.state = CandidateState::Orphan;
        self.insert_candidate(&stored)
    }

    async fn write_immature_error(
        &self,
        candidate: &Candidate,
        state: u8,
        errcode: u8,
    ) -> Result<(), StoreError> {
        self.errors
            .insert(candidate_key(candidate), vec![state, errcode])?;
        Ok(())
    }
}

pub struct SledShareStore {
    rounds: sled::Tree,
}

impl SledShareStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(SledShareStore {
            rounds: db.open_tree("shares")?,
        })
    }

    /// Test/operator helper: seeds a round's shares directly.
    pub fn put_round_shares(
        &self,
        round_height: u64,
        nonce: &str,
        shares: &RoundShares,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(shares)?;
        self.rounds.insert(round_key(round_height, nonce), bytes)?;
        Ok(())
    }
}

#[async_trait]
impl ShareStore for SledShareStore {
    async fn get_round_shares(
        &self,
        round_height: u64,
        nonce: &str,
    ) -> Result<RoundShares, StoreError> {
        match self.rounds.get(round_key(round_height, nonce))? {
            Some(v) => Ok(serde_json::from_slice(&v)?),
            None => Ok(RoundShares::new()),
        }
    }
}

// ---------------------------------------------------------------------
// sqlite backend
// ---------------------------------------------------------------------

pub struct SqliteCandidateStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteCandidateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candidates (
                round_height INTEGER NOT NULL,
                nonce        TEXT NOT NULL,
                record       TEXT NOT NULL,
                state        INTEGER NOT NULL,
                height       INTEGER NOT NULL,
                PRIMARY KEY (round_height, nonce)
            );
            CREATE TABLE IF NOT EXISTS credits (
                pass  TEXT NOT NULL,
                miner TEXT NOT NULL,
                amount TEXT NOT NULL,
                PRIMARY KEY (pass, miner)
            );
            CREATE TABLE IF NOT EXISTS errors (
                round_height INTEGER NOT NULL,
                nonce        TEXT NOT NULL,
                state        INTEGER NOT NULL,
                errcode      INTEGER NOT NULL,
                PRIMARY KEY (round_height, nonce)
            );",
        )?;
        Ok(SqliteCandidateStore {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn upsert(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let record = serde_json::to_string(candidate)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO candidates (round_height, nonce, record, state, height)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(round_height, nonce) DO UPDATE SET
                record = excluded.record, state = excluded.state, height = excluded.height",
            rusqlite::params![
                candidate.round_height as i64,
                candidate.nonce,
                record,
                candidate.state as u8,
                candidate.height as i64,
            ],
        )?;
        Ok(())
    }

    fn apply_credits(
        &self,
        pass: CreditPass,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        for (miner, amount) in rewards {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT amount FROM credits WHERE pass = ?1 AND miner = ?2",
                    rusqlite::params![pass.tree_suffix(), miner],
                    |row| row.get(0),
                )
                .optional()?;
            let existing: BigInt = existing
                .map(|s| s.parse().unwrap_or_else(|_| BigInt::from(0)))
                .unwrap_or_else(|| BigInt::from(0));
            let total = existing + amount;
            conn.execute(
                "INSERT INTO credits (pass, miner, amount) VALUES (?1, ?2, ?3)
                 ON CONFLICT(pass, miner) DO UPDATE SET amount = excluded.amount",
                rusqlite::params![pass.tree_suffix(), miner, total.to_string()],
            )?;
        }
        Ok(())
    }

    pub fn miner_balance(&self, pass: CreditPass, miner: &str) -> Result<BigInt, StoreError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT amount FROM credits WHERE pass = ?1 AND miner = ?2",
                rusqlite::params![pass.tree_suffix(), miner],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing
            .map(|s| s.parse().unwrap_or_else(|_| BigInt::from(0)))
            .unwrap_or_else(|| BigInt::from(0)))
    }
}

#[async_trait]
impl CandidateStore for SqliteCandidateStore {
    async fn get_candidates(&self, max_round_height: u64) -> Result<Vec<Candidate>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT record FROM candidates WHERE state = ?1 AND round_height <= ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![CandidateState::Pending as u8, max_round_height as i64],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    async fn get_immature_blocks(&self, max_height: u64) -> Result<Vec<Candidate>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT record FROM candidates WHERE state = ?1 AND height <= ?2")?;
        let rows = stmt.query_map(
            rusqlite::params![CandidateState::Immature as u8, max_height as i64],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    async fn write_immature_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.state = CandidateState::Immature;
        self.upsert(&stored)?;
        self.apply_credits(CreditPass::Immature, rewards)
    }

    async fn write_matured_block(
        &self,
        candidate: &Candidate,
        rewards: &HashMap<String, BigInt>,
    ) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.state = CandidateState::Matured;
        self.upsert(&stored)?;
        self.apply_credits(CreditPass::Matured, rewards)
    }

    async fn write_pending_orphans(&self, candidates: &[Candidate]) -> Result<(), StoreError> {
        for candidate in candidates {
            self.write_orphan(candidate).await?;
        }
        Ok(())
    }

    async fn write_orphan(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let mut stored = candidate.clone();
        stored.orphan = true;
        stored.state = CandidateState::Orphan;
        self.upsert(&stored)
    }

    async fn write_immature_error(
        &self,
        candidate: &Candidate,
        state: u8,
        errcode: u8,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO errors (round_height, nonce, state, errcode) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(round_height, nonce) DO UPDATE SET state = excluded.state, errcode = excluded.errcode",
            rusqlite::params![
                candidate.round_height as i64,
                candidate.nonce,
                state,
                errcode
            ],
        )?;
        Ok(())
    }
}
