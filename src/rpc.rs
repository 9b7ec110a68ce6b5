//! Ledger RPC client: the trait the engine fetches through, and the
//! JSON-RPC-over-HTTP implementation of it.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

use crate::types::{Account, Block, BlockId, Transaction};

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client")
    })
}

/// Remote reads the engine depends on. Every call may fail with a
/// transport or decoding error; the fetcher treats any failure uniformly.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_block_count(&self) -> Result<u64>;
    async fn get_block(&self, id: &BlockId) -> Result<Block>;
    async fn get_raw_transaction(&self, hash: &str) -> Result<Transaction>;
    async fn get_account_state(&self, address: &str) -> Result<Account>;
}

/// JSON-RPC 2.0 client for a ledger node endpoint.
pub struct HttpLedgerRpc {
    url: String,
    timeout_ms: u64,
}

impl HttpLedgerRpc {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            timeout_ms,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "chainlens",
            "method": method,
            "params": params,
        });
        let res = http_client()
            .post(&self.url)
            .json(&body)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!("http {}", res.status()));
        }
        let v: Value = res.json().await?;
        if let Some(err) = v.get("error") {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
            let msg = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("rpc error");
            return Err(anyhow!("rpc {code} {msg}"));
        }
        v.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("invalid rpc payload (no result)"))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn get_block_count(&self) -> Result<u64> {
        let v = self.call("getblockcount", json!([])).await?;
        v.as_u64()
            .ok_or_else(|| anyhow!("getblockcount returned a non-integer: {v}"))
    }

    async fn get_block(&self, id: &BlockId) -> Result<Block> {
        // verbose=1 asks the node for a decoded block rather than raw bytes
        let params = match id {
            BlockId::Height(height) => json!([height, 1]),
            BlockId::Hash(hash) => json!([hash, 1]),
        };
        let v = self.call("getblock", params).await?;
        Ok(serde_json::from_value(v)?)
    }

    async fn get_raw_transaction(&self, hash: &str) -> Result<Transaction> {
        let v = self.call("getrawtransaction", json!([hash, 1])).await?;
        Ok(serde_json::from_value(v)?)
    }

    async fn get_account_state(&self, address: &str) -> Result<Account> {
        let v = self.call("getaccountstate", json!([address])).await?;
        let mut account: Account = serde_json::from_value(v)?;
        if account.address.is_empty() {
            // some nodes omit the address from the payload
            account.address = address.to_string();
        }
        Ok(account)
    }
}
