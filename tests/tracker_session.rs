//! Tracker session tests - poll loop, request projection, fetch resilience,
//! all against an in-memory mock ledger.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

use chainlens::config::Config;
use chainlens::fetcher::Fetcher;
use chainlens::rpc::LedgerRpc;
use chainlens::tracker::TrackerSession;
use chainlens::types::{Account, AssetBalance, Block, BlockId, TrackerRequest, Transaction};

fn block_hash(index: u64) -> String {
    format!("0x{index:08x}")
}

fn mock_block(index: u64) -> Block {
    Block {
        index,
        hash: block_hash(index),
        size: 512,
        time: 1_700_000_000 + index,
        tx: vec![format!("tx-{index}")],
    }
}

/// In-memory ledger: block at height N has hash 0x{N:08x} and contains
/// the single transaction "tx-N". Failure flags simulate outages.
#[derive(Default)]
struct MockLedger {
    height: AtomicU64,
    count_calls: AtomicU32,
    block_calls: AtomicU32,
    tx_calls: AtomicU32,
    account_calls: AtomicU32,
    fail_height: AtomicBool,
    /// Fail this many height checks, then recover
    fail_height_times: AtomicU32,
    fail_blocks: AtomicBool,
    fail_transactions: AtomicBool,
    fail_accounts: AtomicBool,
}

impl MockLedger {
    fn new(height: u64) -> Arc<Self> {
        let mock = Self::default();
        mock.height.store(height, Ordering::SeqCst);
        Arc::new(mock)
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_block_count(&self) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_height.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unavailable"));
        }
        if self
            .fail_height_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("rpc unavailable"));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_block(&self, id: &BlockId) -> Result<Block> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unavailable"));
        }
        let index = match id {
            BlockId::Height(height) => *height,
            BlockId::Hash(hash) => u64::from_str_radix(hash.trim_start_matches("0x"), 16)
                .map_err(|_| anyhow!("unknown block {hash}"))?,
        };
        if index >= self.height.load(Ordering::SeqCst) {
            return Err(anyhow!("unknown block {index}"));
        }
        Ok(mock_block(index))
    }

    async fn get_raw_transaction(&self, hash: &str) -> Result<Transaction> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unavailable"));
        }
        let index: u64 = hash
            .strip_prefix("tx-")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("unknown transaction {hash}"))?;
        Ok(Transaction {
            hash: hash.to_string(),
            blockhash: block_hash(index),
            size: 250,
            sender: Some("alice".to_string()),
        })
    }

    async fn get_account_state(&self, address: &str) -> Result<Account> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_accounts.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unavailable"));
        }
        Ok(Account {
            address: address.to_string(),
            balances: vec![AssetBalance {
                asset: "gas".to_string(),
                value: "100".to_string(),
            }],
        })
    }
}

fn request() -> TrackerRequest {
    TrackerRequest::default()
}

// --- fetcher ---

#[tokio::test]
async fn retry_exhaustion_attempts_exactly_max_retries_and_names_the_key() {
    let mock = MockLedger::new(100);
    mock.fail_blocks.store(true, Ordering::SeqCst);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    let err = fetcher
        .block(&BlockId::Height(5), 100)
        .await
        .expect_err("all attempts fail");

    assert_eq!(mock.block_calls.load(Ordering::SeqCst), 5);
    let msg = err.to_string();
    assert!(msg.contains("maximum retries exceeded"), "got: {msg}");
    assert!(msg.contains("block 5"), "got: {msg}");
}

#[tokio::test]
async fn transient_failure_recovers_within_the_retry_ceiling() {
    let mock = MockLedger::new(100);
    mock.fail_height_times.store(2, Ordering::SeqCst);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    let height = fetcher.block_count().await.expect("recovers");
    assert_eq!(height, 100);
    assert_eq!(mock.count_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn head_block_is_never_cached() {
    let mock = MockLedger::new(100);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    fetcher.block(&BlockId::Height(99), 100).await.unwrap();
    assert_eq!(fetcher.cached_blocks().await, 0);
    fetcher.block(&BlockId::Height(99), 100).await.unwrap();
    assert_eq!(
        mock.block_calls.load(Ordering::SeqCst),
        2,
        "head block must be refetched every time"
    );

    fetcher.block(&BlockId::Height(98), 100).await.unwrap();
    fetcher.block(&BlockId::Height(98), 100).await.unwrap();
    assert_eq!(
        mock.block_calls.load(Ordering::SeqCst),
        3,
        "non-head block is served from cache on the second lookup"
    );
    assert_eq!(fetcher.cached_blocks().await, 1);
}

#[tokio::test]
async fn cached_block_answers_by_height_and_by_hash() {
    let mock = MockLedger::new(100);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    fetcher.block(&BlockId::Height(5), 100).await.unwrap();
    fetcher
        .block(&BlockId::Hash(block_hash(5)), 100)
        .await
        .unwrap();
    assert_eq!(mock.block_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn window_fill_is_descending_and_contiguous() {
    let mock = MockLedger::new(100);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    let blocks = fetcher.blocks(-1, 100).await.unwrap();
    assert_eq!(blocks.len(), 50);
    assert_eq!(blocks[0].index, 99);
    assert_eq!(blocks[49].index, 50);
    assert!(blocks.windows(2).all(|w| w[0].index == w[1].index + 1));
}

#[tokio::test]
async fn failed_fetch_inserts_nothing_into_the_cache() {
    let mock = MockLedger::new(100);
    mock.fail_blocks.store(true, Ordering::SeqCst);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    assert!(fetcher.blocks(-1, 100).await.is_err());
    assert_eq!(fetcher.cached_blocks().await, 0);

    mock.fail_transactions.store(true, Ordering::SeqCst);
    assert!(fetcher.transaction("tx-3").await.is_err());
    assert_eq!(fetcher.cached_transactions().await, 0);
}

#[tokio::test]
async fn accounts_are_never_cached() {
    let mock = MockLedger::new(100);
    let fetcher = Fetcher::new(mock.clone(), &Config::default());

    fetcher.account("addr1").await.unwrap();
    fetcher.account("addr1").await.unwrap();
    assert_eq!(mock.account_calls.load(Ordering::SeqCst), 2);
}

// --- session ---

#[tokio::test(start_paused = true)]
async fn startup_publishes_a_head_tracking_snapshot() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock, &Config::default(), tx);

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.block_height, 100);
    assert_eq!(snapshot.start_at_block, -1);
    assert_eq!(snapshot.blocks.len(), 50);
    assert_eq!(snapshot.blocks[0].index, 99);
    assert!(snapshot.selected_block.is_empty());
    assert!(snapshot.selected_transaction.is_empty());
    session.close();
}

#[tokio::test(start_paused = true)]
async fn head_tracking_view_refills_the_window_on_growth() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock.clone(), &Config::default(), tx);
    rx.recv().await.unwrap();

    mock.height.store(101, Ordering::SeqCst);
    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.block_height, 101);
    assert_eq!(snapshot.blocks[0].index, 100, "window includes the new head");
    session.close();
}

#[tokio::test(start_paused = true)]
async fn history_view_learns_the_height_but_keeps_its_window() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock.clone(), &Config::default(), tx);
    rx.recv().await.unwrap();

    session
        .handle_request(TrackerRequest {
            set_start_at_block: Some(50),
            ..request()
        })
        .await
        .unwrap();
    let anchored = rx.recv().await.unwrap();
    assert_eq!(anchored.start_at_block, 50);
    assert_eq!(anchored.blocks[0].index, 50);

    mock.height.store(101, Ordering::SeqCst);
    let grown = rx.recv().await.unwrap();
    assert_eq!(grown.block_height, 101);
    assert_eq!(
        grown.blocks, anchored.blocks,
        "scroll position is not disturbed"
    );
    session.close();
}

#[tokio::test(start_paused = true)]
async fn selecting_a_block_reanchors_with_lookahead() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock, &Config::default(), tx);
    rx.recv().await.unwrap();

    session
        .handle_request(TrackerRequest {
            select_block: Some("10".to_string()),
            ..request()
        })
        .await
        .unwrap();
    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.start_at_block, 25, "min(99, 10 + 15)");
    assert_eq!(snapshot.selected_block, block_hash(10));
    assert_eq!(snapshot.blocks[0].index, 25);
    assert_eq!(snapshot.blocks.len(), 26, "window floor at genesis");
    session.close();
}

#[tokio::test(start_paused = true)]
async fn selecting_a_transaction_selects_its_block_too() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock, &Config::default(), tx);
    rx.recv().await.unwrap();

    session
        .handle_request(TrackerRequest {
            select_transaction: Some("tx-7".to_string()),
            ..request()
        })
        .await
        .unwrap();
    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.selected_transaction, "tx-7");
    assert_eq!(snapshot.selected_block, block_hash(7));
    assert_eq!(snapshot.start_at_block, 22, "min(99, 7 + 15)");
    assert_eq!(snapshot.blocks[0].index, 22);
    session.close();
}

#[tokio::test(start_paused = true)]
async fn later_facets_overwrite_earlier_window_recomputation() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock, &Config::default(), tx);
    rx.recv().await.unwrap();

    session
        .handle_request(TrackerRequest {
            select_block: Some("40".to_string()),
            select_transaction: Some("tx-7".to_string()),
            ..request()
        })
        .await
        .unwrap();

    let after_block = rx.recv().await.unwrap();
    assert_eq!(after_block.start_at_block, 55);
    assert_eq!(after_block.selected_block, block_hash(40));

    let after_tx = rx.recv().await.unwrap();
    assert_eq!(after_tx.start_at_block, 22);
    assert_eq!(after_tx.selected_block, block_hash(7));
    assert_eq!(after_tx.selected_transaction, "tx-7");
    session.close();
}

#[tokio::test(start_paused = true)]
async fn clearing_a_selection_touches_only_that_facet() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock, &Config::default(), tx);
    rx.recv().await.unwrap();

    session
        .handle_request(TrackerRequest {
            select_address: Some("addr1".to_string()),
            select_transaction: Some("tx-7".to_string()),
            ..request()
        })
        .await
        .unwrap();
    rx.recv().await.unwrap(); // address applied
    let selected = rx.recv().await.unwrap(); // transaction applied
    assert!(selected.selected_address.is_some());
    assert_eq!(selected.selected_transaction, "tx-7");

    session
        .handle_request(TrackerRequest {
            select_address: Some(String::new()),
            ..request()
        })
        .await
        .unwrap();
    let cleared = rx.recv().await.unwrap();
    assert!(cleared.selected_address.is_none());
    assert_eq!(cleared.selected_transaction, "tx-7", "other facets untouched");
    assert_eq!(cleared.selected_block, selected.selected_block);

    // Clearing again is idempotent
    session
        .handle_request(TrackerRequest {
            select_address: Some(String::new()),
            ..request()
        })
        .await
        .unwrap();
    let cleared_again = rx.recv().await.unwrap();
    assert_eq!(cleared_again, cleared);
    session.close();
}

#[tokio::test(start_paused = true)]
async fn failed_request_publishes_nothing_and_keeps_prior_state() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock.clone(), &Config::default(), tx);
    let initial = rx.recv().await.unwrap();

    mock.fail_accounts.store(true, Ordering::SeqCst);
    let err = session
        .handle_request(TrackerRequest {
            select_address: Some("addr1".to_string()),
            ..request()
        })
        .await
        .expect_err("account resolution fails after retries");
    assert!(err.to_string().contains("address addr1"));

    assert!(rx.try_recv().is_err(), "no partial snapshot was published");
    assert_eq!(session.view_state().await, initial);
    session.close();
}

#[tokio::test(start_paused = true)]
async fn poll_loop_degrades_a_failed_height_check_to_a_skipped_cycle() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock.clone(), &Config::default(), tx);
    rx.recv().await.unwrap();

    mock.fail_height.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err(), "failed cycles publish nothing");

    mock.fail_height.store(false, Ordering::SeqCst);
    mock.height.store(101, Ordering::SeqCst);
    let recovered = rx.recv().await.unwrap();
    assert_eq!(recovered.block_height, 101, "loop self-heals");
    session.close();
}

#[tokio::test(start_paused = true)]
async fn close_stops_the_poll_loop_permanently() {
    let mock = MockLedger::new(100);
    let (tx, mut rx) = unbounded_channel();
    let session = TrackerSession::start(mock.clone(), &Config::default(), tx);
    rx.recv().await.unwrap();

    session.close();
    assert!(session.is_closed());
    let calls_at_close = mock.count_calls.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(60)).await;
    // At most the one in-flight cycle finishes after the flag is set.
    assert!(mock.count_calls.load(Ordering::SeqCst) <= calls_at_close + 1);

    mock.height.store(200, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(rx.try_recv().is_err(), "no snapshots after close");
}
