use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use chainlens::config;
use chainlens::rpc::HttpLedgerRpc;
use chainlens::tracker::TrackerSession;
use chainlens::types::ViewState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    dotenvy::dotenv().ok();
    env_logger::init();

    let cfg = config::load().context("failed to load configuration")?;
    log::info!("tracking {}", cfg.rpc_url);

    let rpc = Arc::new(HttpLedgerRpc::new(&cfg.rpc_url, cfg.rpc_timeout_ms));
    let (tx, mut rx) = unbounded_channel::<ViewState>();
    let session = TrackerSession::start(rpc, &cfg, tx);

    // Snapshots stream to stdout as JSON lines until ctrl-c.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                session.close();
                break;
            }
            snapshot = rx.recv() => {
                match snapshot {
                    Some(snapshot) => {
                        if let Some(head) = snapshot.blocks.first() {
                            log::debug!("head block {} at {}", head.index, head.when());
                        }
                        println!("{}", serde_json::to_string(&snapshot)?);
                    }
                    None => break,
                }
            }
        }
    }
    Ok(())
}
