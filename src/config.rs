use anyhow::{anyhow, Result};
use clap::Parser;
use std::env;

use crate::constants::{cache, devnet, fetch, tracker};

/// chainlens - ledger block tracker
///
/// Keeps a display-ready mirror of a remote ledger up to date and serves
/// lookups by height, hash, and address.
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "chainlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ledger block tracker", long_about = None)]
pub struct CliArgs {
    /// Ledger RPC endpoint URL
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Height poll interval in milliseconds (500-60000)
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Blocks materialized per display page (1-500)
    #[arg(long, env = "BLOCKS_PER_PAGE")]
    pub blocks_per_page: Option<usize>,

    /// Lookahead distance when re-anchoring around a selection (0-100)
    #[arg(long, env = "PAGINATION_DISTANCE")]
    pub pagination_distance: Option<u64>,

    /// Block cache capacity (1-100000)
    #[arg(long, env = "BLOCK_CACHE_SIZE")]
    pub block_cache_size: Option<usize>,

    /// Transaction cache capacity (1-100000)
    #[arg(long, env = "TRANSACTION_CACHE_SIZE")]
    pub transaction_cache_size: Option<usize>,

    /// Attempts per remote read before failing permanently (1-10)
    #[arg(long, env = "MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Per-request HTTP timeout in milliseconds (1000-60000)
    #[arg(long, env = "RPC_TIMEOUT_MS")]
    pub rpc_timeout_ms: Option<u64>,

    /// Binary name of the local developer-network CLI
    #[arg(long, env = "DEVNET_BINARY")]
    pub devnet_binary: Option<String>,

    /// Minimum major version of the devnet tool; 0 disables the check
    #[arg(long, env = "DEVNET_MIN_VERSION")]
    pub devnet_min_version: Option<u32>,

    /// Wall-clock budget for one devnet invocation in milliseconds (1000-60000)
    #[arg(long, env = "DEVNET_TIMEOUT_MS")]
    pub devnet_timeout_ms: Option<u64>,

    /// Devnet watchdog granularity in milliseconds (50-5000)
    #[arg(long, env = "DEVNET_WATCHDOG_MS")]
    pub devnet_watchdog_ms: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub rpc_url: String,
    pub poll_interval_ms: u64,
    pub blocks_per_page: usize,
    pub pagination_distance: u64,
    pub block_cache_size: usize,
    pub transaction_cache_size: usize,
    pub max_retries: u32,
    pub rpc_timeout_ms: u64,
    pub devnet_binary: String,
    pub devnet_min_version: u32,
    pub devnet_timeout_ms: u64,
    pub devnet_watchdog_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:10332".to_string(),
            poll_interval_ms: tracker::POLL_INTERVAL_MS,
            blocks_per_page: tracker::BLOCKS_PER_PAGE,
            pagination_distance: tracker::PAGINATION_DISTANCE,
            block_cache_size: cache::BLOCK_CACHE_SIZE,
            transaction_cache_size: cache::TRANSACTION_CACHE_SIZE,
            max_retries: fetch::MAX_RETRIES,
            rpc_timeout_ms: fetch::RPC_TIMEOUT_MS,
            devnet_binary: devnet::BINARY.to_string(),
            devnet_min_version: devnet::MIN_VERSION,
            devnet_timeout_ms: devnet::TIMEOUT_MS,
            devnet_watchdog_ms: devnet::WATCHDOG_INTERVAL_MS,
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

/// Load configuration from CLI args and environment variables
/// Priority: CLI args > Environment variables > Defaults
pub fn load() -> Result<Config> {
    let args = CliArgs::parse();
    let defaults = Config::default();

    let rpc_url = args
        .rpc_url
        .or_else(|| env::var("RPC_URL").ok())
        .unwrap_or(defaults.rpc_url);
    validate_url(&rpc_url, "RPC_URL")?;

    let poll_interval_ms = args
        .poll_interval_ms
        .or_else(|| {
            env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.poll_interval_ms);
    let poll_interval_ms = validate_in_range(poll_interval_ms, 500, 60000, "POLL_INTERVAL_MS")?;

    let blocks_per_page = args
        .blocks_per_page
        .or_else(|| {
            env::var("BLOCKS_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.blocks_per_page);
    let blocks_per_page = validate_in_range(blocks_per_page, 1, 500, "BLOCKS_PER_PAGE")?;

    let pagination_distance = args
        .pagination_distance
        .or_else(|| {
            env::var("PAGINATION_DISTANCE")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.pagination_distance);
    let pagination_distance =
        validate_in_range(pagination_distance, 0, 100, "PAGINATION_DISTANCE")?;

    let block_cache_size = args
        .block_cache_size
        .or_else(|| {
            env::var("BLOCK_CACHE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.block_cache_size);
    let block_cache_size = validate_in_range(block_cache_size, 1, 100_000, "BLOCK_CACHE_SIZE")?;

    let transaction_cache_size = args
        .transaction_cache_size
        .or_else(|| {
            env::var("TRANSACTION_CACHE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.transaction_cache_size);
    let transaction_cache_size = validate_in_range(
        transaction_cache_size,
        1,
        100_000,
        "TRANSACTION_CACHE_SIZE",
    )?;

    let max_retries = args
        .max_retries
        .or_else(|| env::var("MAX_RETRIES").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(defaults.max_retries);
    let max_retries = validate_in_range(max_retries, 1, 10, "MAX_RETRIES")?;

    let rpc_timeout_ms = args
        .rpc_timeout_ms
        .or_else(|| env::var("RPC_TIMEOUT_MS").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(defaults.rpc_timeout_ms);
    let rpc_timeout_ms = validate_in_range(rpc_timeout_ms, 1000, 60000, "RPC_TIMEOUT_MS")?;

    let devnet_binary = args
        .devnet_binary
        .or_else(|| env::var("DEVNET_BINARY").ok())
        .unwrap_or(defaults.devnet_binary);
    if devnet_binary.is_empty() {
        return Err(anyhow!("DEVNET_BINARY cannot be empty"));
    }

    let devnet_min_version = args
        .devnet_min_version
        .or_else(|| {
            env::var("DEVNET_MIN_VERSION")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.devnet_min_version);

    let devnet_timeout_ms = args
        .devnet_timeout_ms
        .or_else(|| {
            env::var("DEVNET_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.devnet_timeout_ms);
    let devnet_timeout_ms = validate_in_range(devnet_timeout_ms, 1000, 60000, "DEVNET_TIMEOUT_MS")?;

    let devnet_watchdog_ms = args
        .devnet_watchdog_ms
        .or_else(|| {
            env::var("DEVNET_WATCHDOG_MS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(defaults.devnet_watchdog_ms);
    let devnet_watchdog_ms = validate_in_range(devnet_watchdog_ms, 50, 5000, "DEVNET_WATCHDOG_MS")?;

    Ok(Config {
        rpc_url,
        poll_interval_ms,
        blocks_per_page,
        pagination_distance,
        block_cache_size,
        transaction_cache_size,
        max_retries,
        rpc_timeout_ms,
        devnet_binary,
        devnet_min_version,
        devnet_timeout_ms,
        devnet_watchdog_ms,
    })
}

impl Config {
    /// Print current configuration (useful for debugging)
    pub fn print_summary(&self) {
        eprintln!("chainlens configuration:");
        eprintln!("  RPC URL: {}", self.rpc_url);
        eprintln!("  Poll interval: {}ms", self.poll_interval_ms);
        eprintln!("  Blocks per page: {}", self.blocks_per_page);
        eprintln!("  Pagination distance: {}", self.pagination_distance);
        eprintln!(
            "  Caches: {} blocks / {} transactions",
            self.block_cache_size, self.transaction_cache_size
        );
        eprintln!("  Max retries: {}", self.max_retries);
        eprintln!("  RPC timeout: {}ms", self.rpc_timeout_ms);
        eprintln!(
            "  Devnet tool: {} (>= v{}, timeout {}ms)",
            self.devnet_binary, self.devnet_min_version, self.devnet_timeout_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validation_rejects_out_of_bounds() {
        assert!(validate_in_range(3000u64, 500, 60000, "X").is_ok());
        assert!(validate_in_range(100u64, 500, 60000, "X").is_err());
        assert!(validate_in_range(70000u64, 500, 60000, "X").is_err());
    }

    #[test]
    fn url_validation_requires_http_scheme() {
        assert!(validate_url("http://127.0.0.1:10332", "X").is_ok());
        assert!(validate_url("https://node.example.org", "X").is_ok());
        assert!(validate_url("ftp://node", "X").is_err());
        assert!(validate_url("", "X").is_err());
    }
}
