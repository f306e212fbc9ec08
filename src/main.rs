//! Autonomous on-chain trading agent — entry point.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-14 — replaced the arbitrage-bot placeholder loop
//! with the trading agent's Settings::load() + supervisor::run()
//! startup sequence (spec.md §4.9, §6).

use tracing_subscriber::EnvFilter;
use trade_agent::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .json()
        .init();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("startup failed: {e:#}");
            std::process::exit(1);
        }
    };

    trade_agent::supervisor::run(settings).await
}
