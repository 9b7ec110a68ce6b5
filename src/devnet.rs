//! Runner for the local developer-network CLI.
//!
//! Two remote-call kinds, two resilience mechanisms: ledger RPC reads are
//! retried (see `fetcher`) and never time out; tool invocations time out
//! under a wall-clock watchdog and are never retried. Invocations are
//! serialized process-wide - the external tool does not tolerate running
//! concurrently, even across sessions.

use anyhow::{anyhow, Context, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::Config;
use crate::constants::devnet;

static RUN_LOCK: Mutex<()> = Mutex::const_new(());

/// Merged output of one tool invocation. A non-zero exit is reported here
/// rather than as an `Err` - the tool prints its own diagnostics.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub message: String,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct DevnetTool {
    binary: String,
    min_version: u32,
    timeout_ms: u64,
    watchdog_interval_ms: u64,
}

impl DevnetTool {
    pub fn new(binary: impl Into<String>, min_version: u32) -> Self {
        Self {
            binary: binary.into(),
            min_version,
            timeout_ms: devnet::TIMEOUT_MS,
            watchdog_interval_ms: devnet::WATCHDOG_INTERVAL_MS,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            binary: cfg.devnet_binary.clone(),
            min_version: cfg.devnet_min_version,
            timeout_ms: cfg.devnet_timeout_ms,
            watchdog_interval_ms: cfg.devnet_watchdog_ms,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64, watchdog_interval_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self.watchdog_interval_ms = watchdog_interval_ms;
        self
    }

    /// Serialized invocation: queues on the process-wide lock, then runs.
    /// Slow invocations are logged.
    pub async fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        let _guard = RUN_LOCK.lock().await;
        let started = Instant::now();
        let result = self.run_unsafe(args).await;
        let elapsed = started.elapsed();
        if elapsed > Duration::from_millis(devnet::SLOW_CALL_MS) {
            log::info!(
                "`{} {}` took {}ms",
                self.binary,
                args.join(" "),
                elapsed.as_millis()
            );
        }
        result
    }

    /// Unserialized invocation under the wall-clock watchdog. No retry:
    /// a timed-out or failed run is reported, not reattempted, and the
    /// partially-run process's outcome is not reconciled.
    pub async fn run_unsafe(&self, args: &[&str]) -> Result<ToolOutput> {
        self.check_prerequisite().await?;
        let started = Instant::now();
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("could not launch {}", self.binary))?;
        let budget = Duration::from_millis(self.timeout_ms);
        let interval = Duration::from_millis(self.watchdog_interval_ms);
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output
                    .with_context(|| format!("failed to collect output from {}", self.binary))?;
                let mut message = String::from_utf8_lossy(&output.stdout).into_owned();
                message.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(ToolOutput {
                    message,
                    is_error: !output.status.success(),
                })
            }
            _ = watchdog(started, budget, interval) => {
                Err(anyhow!(
                    "`{} {}` timed out after {}ms",
                    self.binary,
                    args.join(" "),
                    self.timeout_ms
                ))
            }
        }
    }

    /// Verify the tool is installed and recent enough. Not retried; the
    /// error carries the remediation.
    pub async fn check_prerequisite(&self) -> Result<()> {
        if self.min_version == 0 {
            return Ok(());
        }
        let ok = match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => {
                let text = String::from_utf8_lossy(&output.stdout);
                leading_version(&text).is_some_and(|v| v >= self.min_version)
            }
            Err(e) => {
                log::error!("prerequisite check for {} failed: {e}", self.binary);
                false
            }
        };
        if ok {
            Ok(())
        } else {
            Err(anyhow!(
                "{} {} or higher is required to use this functionality; \
                 install it and make sure it is on PATH",
                self.binary,
                self.min_version
            ))
        }
    }
}

/// Resolves once the elapsed wall-clock time exceeds the budget,
/// re-checking at the configured granularity.
async fn watchdog(started: Instant, budget: Duration, interval: Duration) {
    loop {
        if started.elapsed() > budget {
            return;
        }
        sleep(interval).await;
    }
}

/// First integer anywhere in the version text ("tool 2.7.1" -> 2).
fn leading_version(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}
