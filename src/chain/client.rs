// Read-only view of the blockchain node. All responses carry hex-encoded
// fields; decoding is this client's responsibility, never the caller's.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::types::{Block, Receipt, Uncle};
use crate::error::ChainClientError;

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ChainClientError>;
    async fn get_uncle_by_block_number_and_index(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<Uncle>, ChainClientError>;
    async fn get_tx_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, ChainClientError>;
    /// Returns only `.number` of the pending head, per the contract.
    async fn get_pending_height(&self) -> Result<u64, ChainClientError>;
}

/// Production `ChainClient`: JSON-RPC 2.0 over HTTP against a daemon URL.
pub struct RpcChainClient {
    http: reqwest::Client,
    daemon: String,
}

impl RpcChainClient {
    pub fn new(daemon: impl Into<String>, timeout: Duration) -> Result<Self, ChainClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RpcChainClient {
            http,
            daemon: daemon.into(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp: Value = self
            .http
            .post(&self.daemon)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = resp.get("error") {
            return Err(ChainClientError::Rpc(err.to_string()));
        }
        Ok(resp.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ChainClientError> {
        let height_hex = format!("0x{height:x}");
        let result = self
            .call("eth_getBlockByNumber", json!([height_hex, true]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let block: Block = serde_json::from_value(result)
            .map_err(|e| ChainClientError::Rpc(format!("malformed block: {e}")))?;
        Ok(Some(block))
    }

    async fn get_uncle_by_block_number_and_index(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<Uncle>, ChainClientError> {
        let height_hex = format!("0x{height:x}");
        let index_hex = format!("0x{index:x}");
        let result = self
            .call(
                "eth_getUncleByBlockNumberAndIndex",
                json!([height_hex, index_hex]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let uncle: Uncle = serde_json::from_value(result)
            .map_err(|e| ChainClientError::Rpc(format!("malformed uncle: {e}")))?;
        Ok(Some(uncle))
    }

    async fn get_tx_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, ChainClientError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: Receipt = serde_json::from_value(result)
            .map_err(|e| ChainClientError::Rpc(format!("malformed receipt: {e}")))?;
        Ok(Some(receipt))
    }

    async fn get_pending_height(&self) -> Result<u64, ChainClientError> {
        let result = self
            .call("eth_getBlockByNumber", json!(["pending", false]))
            .await?;
        if result.is_null() {
            return Err(ChainClientError::Rpc(
                "pending block was null".to_string(),
            ));
        }
        let number = result
            .get("number")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainClientError::Rpc("pending block missing number".to_string()))?;
        super::types::hex_to_u64(number).map_err(|source| ChainClientError::Decode {
            field: "number",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeChainClient;

    #[tokio::test]
    async fn fake_client_returns_seeded_block() {
        let client = FakeChainClient::default();
        client.blocks.lock().unwrap().insert(
            100,
            Block {
                number: "0x64".to_string(),
                hash: "0xaaa".to_string(),
                nonce: "0xABC".to_string(),
                seal_fields: vec![],
                uncles: vec![],
                transactions: vec![],
            },
        );
        let block = client.get_block_by_height(100).await.unwrap();
        assert!(block.is_some());
        assert_eq!(block.unwrap().hash, "0xaaa");
    }
}
