// =============================================================================
// Funding Sweeper — Main Entry Point
// =============================================================================
//
// Watches one coin in the exchange funding wallet and withdraws the whole free
// balance to a fixed address whenever it becomes non-zero. Runs until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod config;
mod scheduler;
mod types;
mod withdraw;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::client::BinanceClient;
use crate::config::AppConfig;
use crate::scheduler::Scheduler;
use crate::withdraw::Withdrawer;

/// Skew beyond which signed requests start getting rejected.
const MAX_CLOCK_SKEW_MS: i64 = 1_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Funding sweeper starting up");

    let config = AppConfig::from_env().context("invalid configuration")?;

    // ── 2. Exchange client ───────────────────────────────────────────────
    let client = BinanceClient::new(&config.credentials, &config.base_url, config.recv_window)?;

    match client.clock_skew_ms().await {
        Ok(skew_ms) if skew_ms.abs() > MAX_CLOCK_SKEW_MS => {
            warn!(skew_ms, "local clock is out of step with the exchange; signed requests may be rejected");
        }
        Ok(skew_ms) => info!(skew_ms, "exchange reachable"),
        Err(e) => warn!(error = %format!("{e:#}"), "exchange time check failed; continuing"),
    }

    // ── 3. Shutdown wiring ───────────────────────────────────────────────
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Shutdown signal received — stopping");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
            }
        }
    });

    // ── 4. Poll until stopped ────────────────────────────────────────────
    let scheduler = Scheduler::new(Withdrawer::new(client, config.target), config.schedule);
    scheduler.run(cancel).await;

    info!("Funding sweeper shut down complete.");
    Ok(())
}
