//! Tracker session: the poll loop and the request handler, both projecting
//! into a single live `ViewState` published to the display host.
//!
//! The session owns the view state behind one mutex, so the poll loop and
//! request handling serialize with each other; fetches inside one window
//! fill still run concurrently. Every applied change publishes a fresh
//! copy-on-write snapshot over the channel, in production order.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::Config;
use crate::constants::tracker::TRACK_HEAD;
use crate::fetcher::Fetcher;
use crate::pagination;
use crate::rpc::LedgerRpc;
use crate::types::{BlockId, TrackerRequest, ViewState};

pub struct TrackerSession {
    fetcher: Fetcher,
    state: Mutex<ViewState>,
    publisher: UnboundedSender<ViewState>,
    closed: AtomicBool,
    poll_interval: Duration,
    pagination_distance: u64,
}

impl TrackerSession {
    /// Construct a session and start its poll loop immediately.
    pub fn start(
        rpc: Arc<dyn LedgerRpc>,
        cfg: &Config,
        publisher: UnboundedSender<ViewState>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            fetcher: Fetcher::new(rpc, cfg),
            state: Mutex::new(ViewState::new()),
            publisher,
            closed: AtomicBool::new(false),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            pagination_distance: cfg.pagination_distance,
        });
        let poller = Arc::clone(&session);
        tokio::spawn(async move { poller.poll_loop().await });
        session
    }

    /// Stop the poll loop. In-flight work is not aborted; the loop simply
    /// never reschedules once it observes the flag.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn view_state(&self) -> ViewState {
        self.state.lock().await.clone()
    }

    async fn poll_loop(&self) {
        log::info!("height poll loop started");
        loop {
            if self.is_closed() {
                log::info!("session closed, height poll loop stopped");
                return;
            }
            // A failed height check skips the cycle; nothing can prevent
            // the next one.
            if let Err(e) = self.poll_once().await {
                log::warn!("height check failed, skipping cycle: {e:#}");
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn poll_once(&self) -> Result<()> {
        let known = self.state.lock().await.block_height;
        let height = self.fetcher.block_count().await?;
        if height > known {
            log::info!("new block available, height {height}");
            self.on_new_height(height).await?;
        }
        Ok(())
    }

    /// Apply a detected height increase.
    ///
    /// A history view (anchor >= 0) only learns the new height - its
    /// window stays put so the scroll position is not disturbed. A
    /// head-tracking view also refills the window to include the new head.
    async fn on_new_height(&self, height: u64) -> Result<()> {
        let anchor = self.state.lock().await.start_at_block;
        if anchor >= 0 {
            self.update(|s| s.block_height = height).await;
        } else {
            let blocks = self.fetcher.blocks(TRACK_HEAD, height).await?;
            self.update(move |s| {
                s.block_height = height;
                s.blocks = blocks;
            })
            .await;
        }
        Ok(())
    }

    /// Resolve a display-originated request.
    ///
    /// Facets apply independently in fixed order: address, anchor, block,
    /// transaction. Each applied facet publishes its own snapshot, so a
    /// later facet's window recomputation overwrites an earlier one within
    /// the same request. A resolution failure fails the request; facets
    /// not yet applied leave the prior view state untouched.
    pub async fn handle_request(&self, request: TrackerRequest) -> Result<()> {
        if let Some(address) = request.select_address {
            if address.is_empty() {
                self.update(|s| s.selected_address = None).await;
            } else {
                let account = self.fetcher.account(&address).await?;
                self.update(move |s| s.selected_address = Some(account))
                    .await;
            }
        }
        if let Some(anchor) = request.set_start_at_block {
            let height = self.state.lock().await.block_height;
            let blocks = self.fetcher.blocks(anchor, height).await?;
            self.update(move |s| {
                s.start_at_block = anchor;
                s.blocks = blocks;
            })
            .await;
        }
        if let Some(key) = request.select_block {
            if key.is_empty() {
                self.update(|s| s.selected_block.clear()).await;
            } else {
                let height = self.state.lock().await.block_height;
                let block = self.fetcher.block(&BlockId::parse(&key), height).await?;
                let anchor =
                    pagination::anchor_for_selection(block.index, height, self.pagination_distance);
                let blocks = self.fetcher.blocks(anchor, height).await?;
                self.update(move |s| {
                    s.selected_block = block.hash;
                    s.start_at_block = anchor;
                    s.blocks = blocks;
                })
                .await;
            }
        }
        if let Some(hash) = request.select_transaction {
            if hash.is_empty() {
                self.update(|s| s.selected_transaction.clear()).await;
            } else {
                let height = self.state.lock().await.block_height;
                let transaction = self.fetcher.transaction(&hash).await?;
                let block = self
                    .fetcher
                    .block(&BlockId::Hash(transaction.blockhash.clone()), height)
                    .await?;
                let anchor =
                    pagination::anchor_for_selection(block.index, height, self.pagination_distance);
                let blocks = self.fetcher.blocks(anchor, height).await?;
                self.update(move |s| {
                    s.selected_transaction = transaction.hash;
                    s.selected_block = block.hash;
                    s.start_at_block = anchor;
                    s.blocks = blocks;
                })
                .await;
            }
        }
        Ok(())
    }

    /// Replace the live view state wholesale and publish the new snapshot.
    ///
    /// The publish happens under the state lock so the display host
    /// observes snapshots strictly in the order they were produced.
    async fn update(&self, apply: impl FnOnce(&mut ViewState)) {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        apply(&mut next);
        *state = next.clone();
        if self.publisher.send(next).is_err() {
            log::debug!("display host dropped the snapshot channel");
        }
    }
}
