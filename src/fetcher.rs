//! Resilient fetcher: bounded retry around every remote read, backed by
//! the FIFO entity caches.
//!
//! Retries are back-to-back with no delay; every attempt logs its number
//! and every failure the error. After the ceiling the operation fails
//! permanently with an error naming the entity kind and key - callers
//! decide whether to propagate (request handling) or degrade (poll loop).

use anyhow::{anyhow, Result};
use futures::future::{try_join_all, BoxFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::cache::{BlockCache, TransactionCache};
use crate::config::Config;
use crate::constants::fetch;
use crate::pagination;
use crate::rpc::LedgerRpc;
use crate::types::{Account, Block, BlockId, Transaction};

async fn retrying<'a, T>(
    max_retries: u32,
    kind: &str,
    key: &str,
    op: impl Fn() -> BoxFuture<'a, Result<T>>,
) -> Result<T> {
    let what = if key.is_empty() {
        kind.to_string()
    } else {
        format!("{kind} {key}")
    };
    for attempt in 1..=max_retries {
        log::info!("retrieving {what} - attempt {attempt}");
        let started = Instant::now();
        match op().await {
            Ok(value) => {
                let elapsed = started.elapsed();
                if elapsed > Duration::from_millis(fetch::SLOW_CALL_MS) {
                    log::info!("retrieving {what} took {}ms", elapsed.as_millis());
                }
                return Ok(value);
            }
            Err(e) => log::warn!("error retrieving {what}: {e:#}"),
        }
    }
    Err(anyhow!(
        "maximum retries exceeded while trying to retrieve {what}"
    ))
}

/// Retrying reads against the ledger RPC, populating the entity caches.
pub struct Fetcher {
    rpc: Arc<dyn LedgerRpc>,
    blocks: Mutex<BlockCache>,
    transactions: Mutex<TransactionCache>,
    max_retries: u32,
    page_size: usize,
}

impl Fetcher {
    pub fn new(rpc: Arc<dyn LedgerRpc>, cfg: &Config) -> Self {
        Self {
            rpc,
            blocks: Mutex::new(BlockCache::new(cfg.block_cache_size)),
            transactions: Mutex::new(TransactionCache::new(cfg.transaction_cache_size)),
            max_retries: cfg.max_retries,
            page_size: cfg.blocks_per_page,
        }
    }

    /// Current chain height. Retried like every other remote read.
    pub async fn block_count(&self) -> Result<u64> {
        retrying(self.max_retries, "chain height", "", || {
            self.rpc.get_block_count()
        })
        .await
    }

    /// Resolve a block by height or hash, cache-first.
    ///
    /// The head block (height `chain_height - 1`) is never cached: some
    /// ledgers may still replace it before finality.
    pub async fn block(&self, id: &BlockId, chain_height: u64) -> Result<Block> {
        if let Some(cached) = self.blocks.lock().await.get(id) {
            return Ok(cached);
        }
        let key = id.to_string();
        let block = retrying(self.max_retries, "block", &key, || self.rpc.get_block(id)).await?;
        if block.index + 1 < chain_height {
            self.blocks.lock().await.insert(block.clone());
        }
        Ok(block)
    }

    /// Materialize the display window anchored at `start_at`.
    ///
    /// Heights are fetched concurrently; a single exhausted-retry failure
    /// fails the whole fill so the window is never partially stale.
    pub async fn blocks(&self, start_at: i64, chain_height: u64) -> Result<Vec<Block>> {
        let window = pagination::compute_window(start_at, chain_height, self.page_size);
        let fetches = window.into_iter().map(|height| {
            let id = BlockId::Height(height);
            async move { self.block(&id, chain_height).await }
        });
        try_join_all(fetches).await
    }

    /// Resolve a transaction by hash, cache-first.
    pub async fn transaction(&self, hash: &str) -> Result<Transaction> {
        if let Some(cached) = self.transactions.lock().await.get(hash) {
            return Ok(cached);
        }
        let transaction = retrying(self.max_retries, "transaction", hash, || {
            self.rpc.get_raw_transaction(hash)
        })
        .await?;
        self.transactions.lock().await.insert(transaction.clone());
        Ok(transaction)
    }

    /// Fetch account state. Always fresh - account state changes between
    /// blocks, so it is deliberately not cached.
    pub async fn account(&self, address: &str) -> Result<Account> {
        retrying(self.max_retries, "address", address, || {
            self.rpc.get_account_state(address)
        })
        .await
    }

    /// Number of blocks currently cached. Used by tests.
    pub async fn cached_blocks(&self) -> usize {
        self.blocks.lock().await.len()
    }

    /// Number of transactions currently cached. Used by tests.
    pub async fn cached_transactions(&self) -> usize {
        self.transactions.lock().await.len()
    }
}
