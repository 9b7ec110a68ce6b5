//! Application constants
//!
//! Centralized defaults for polling, pagination, caching, retries, and the
//! devnet tool runner. Everything here is overridable through `config`.

/// Tracker session and pagination constants
pub mod tracker {
    /// How often the poll loop checks for chain growth (milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 3000;

    /// Number of blocks materialized per display page
    pub const BLOCKS_PER_PAGE: usize = 50;

    /// Lookahead distance used when re-anchoring around a selection
    ///
    /// Selecting a block places it this many rows below the top of the
    /// window instead of at the very edge, so a few newer blocks stay
    /// visible above it.
    pub const PAGINATION_DISTANCE: u64 = 15;

    /// Anchor value meaning "track the live head"
    pub const TRACK_HEAD: i64 = -1;
}

/// Entity cache sizing
pub mod cache {
    /// Maximum decoded blocks retained (FIFO eviction)
    pub const BLOCK_CACHE_SIZE: usize = 1024;

    /// Maximum decoded transactions retained (FIFO eviction)
    pub const TRANSACTION_CACHE_SIZE: usize = 1024;
}

/// Remote fetch resilience constants
pub mod fetch {
    /// Attempts per remote read before the operation fails permanently
    pub const MAX_RETRIES: u32 = 5;

    /// Remote calls slower than this are logged (milliseconds)
    pub const SLOW_CALL_MS: u64 = 1000;

    /// Per-request HTTP timeout (milliseconds)
    pub const RPC_TIMEOUT_MS: u64 = 8000;
}

/// Devnet tool runner constants
pub mod devnet {
    /// Default binary name of the local developer-network CLI
    pub const BINARY: &str = "devnet";

    /// Minimum major version of the tool (0 disables the check)
    pub const MIN_VERSION: u32 = 1;

    /// Wall-clock budget for one tool invocation (milliseconds)
    pub const TIMEOUT_MS: u64 = 5000;

    /// How often the watchdog re-checks elapsed time (milliseconds)
    pub const WATCHDOG_INTERVAL_MS: u64 = 250;

    /// Invocations slower than this are logged (milliseconds)
    pub const SLOW_CALL_MS: u64 = 1000;
}
