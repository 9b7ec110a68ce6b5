use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded ledger block. Immutable once fetched; the engine assumes an
/// append-only ledger and never revises a block it has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub hash: String,
    #[serde(default)]
    pub size: u64,
    /// Unix seconds
    #[serde(default)]
    pub time: u64,
    /// Hashes of the transactions contained in this block
    #[serde(default)]
    pub tx: Vec<String>,
}

impl Block {
    /// Human-readable block time, for log lines and snapshot output
    pub fn when(&self) -> String {
        chrono::DateTime::from_timestamp(self.time as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    }
}

/// A decoded transaction with a back-reference to its containing block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub blockhash: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sender: Option<String>,
}

/// One asset balance line of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub value: String,
}

/// Account state. Never cached - balances change between blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

/// Lookup key for a block: height or hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl BlockId {
    /// Lenient parse: an all-digit string is a height, anything else a hash.
    pub fn parse(s: &str) -> BlockId {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            match s.parse() {
                Ok(height) => BlockId::Height(height),
                Err(_) => BlockId::Hash(s.to_string()),
            }
        } else {
            BlockId::Hash(s.to_string())
        }
    }

    pub fn matches(&self, block: &Block) -> bool {
        match self {
            BlockId::Height(height) => block.index == *height,
            BlockId::Hash(hash) => block.hash == *hash,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(height) => write!(f, "{height}"),
            BlockId::Hash(hash) => write!(f, "{hash}"),
        }
    }
}

/// Immutable snapshot of what the display should currently render.
///
/// Exactly one is live per session; every change replaces it wholesale so
/// the display host can diff old vs new and re-render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    /// Highest known chain height
    pub block_height: u64,
    /// Pagination anchor; -1 means "track the live head"
    pub start_at_block: i64,
    /// Descending, contiguous window of blocks from the anchor
    pub blocks: Vec<Block>,
    pub selected_address: Option<Account>,
    /// Hash of the selected block, empty when nothing is selected
    pub selected_block: String,
    /// Hash of the selected transaction, empty when nothing is selected
    pub selected_transaction: String,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            block_height: 0,
            start_at_block: crate::constants::tracker::TRACK_HEAD,
            blocks: Vec::new(),
            selected_address: None,
            selected_block: String::new(),
            selected_transaction: String::new(),
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

/// A display-originated patch request. Absent fields mean "no change for
/// this facet"; a present-but-empty value clears that selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerRequest {
    #[serde(default)]
    pub select_address: Option<String>,
    #[serde(default)]
    pub set_start_at_block: Option<i64>,
    /// Decimal height or block hash
    #[serde(default)]
    pub select_block: Option<String>,
    #[serde(default)]
    pub select_transaction: Option<String>,
}
