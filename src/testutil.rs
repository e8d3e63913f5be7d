// Hand-rolled test doubles shared across unit and integration tests.
// No mocking framework.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::candidate::RoundShares;
use crate::chain::{Block, ChainClient, Receipt, Uncle};
use crate::error::ChainClientError;
use crate::store::ShareStore;

#[derive(Default)]
pub struct FakeChainClient {
    pub blocks: Mutex<HashMap<u64, Block>>,
    pub uncles: Mutex<HashMap<(u64, u64), Uncle>>,
    pub receipts: Mutex<HashMap<String, Receipt>>,
    pub pending_height: Mutex<u64>,
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ChainClientError> {
        Ok(self.blocks.lock().unwrap().get(&height).cloned())
    }

    async fn get_uncle_by_block_number_and_index(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<Uncle>, ChainClientError> {
        Ok(self.uncles.lock().unwrap().get(&(height, index)).cloned())
    }

    async fn get_tx_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, ChainClientError> {
        Ok(self.receipts.lock().unwrap().get(tx_hash).cloned())
    }

    async fn get_pending_height(&self) -> Result<u64, ChainClientError> {
        Ok(*self.pending_height.lock().unwrap())
    }
}

/// In-memory `ShareStore`, keyed exactly like the real one:
/// `(round_height, nonce) -> RoundShares`.
#[derive(Default)]
pub struct FakeShareStore {
    pub rounds: Mutex<HashMap<(u64, String), RoundShares>>,
}

impl FakeShareStore {
    pub fn seed(&self, round_height: u64, nonce: &str, shares: RoundShares) {
        self.rounds
            .lock()
            .unwrap()
            .insert((round_height, nonce.to_string()), shares);
    }
}

#[async_trait]
impl ShareStore for FakeShareStore {
    async fn get_round_shares(
        &self,
        round_height: u64,
        nonce: &str,
    ) -> Result<RoundShares, crate::error::StoreError> {
        Ok(self
            .rounds
            .lock()
            .unwrap()
            .get(&(round_height, nonce.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
