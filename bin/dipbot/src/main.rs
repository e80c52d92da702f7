use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, LogFormat, OrderGateway, PriceFeed};
use engine::{BinancePriceFeed, StrategyRunner};
use paper::PaperClient;
use strategy::{AccountFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().unwrap_or_else(|e| panic!("Invalid configuration: {e}"));

    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cfg.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    info!("DipBot starting");

    // ── Collaborators ─────────────────────────────────────────────────────────
    let price_feed: Arc<dyn PriceFeed> = Arc::new(
        BinancePriceFeed::from_config(&cfg)
            .unwrap_or_else(|e| panic!("Failed to build price feed: {e}")),
    );
    // Orders are only recorded, never sent to a venue.
    let gateway: Arc<dyn OrderGateway> = Arc::new(PaperClient::new());

    // ── Accounts & strategies ─────────────────────────────────────────────────
    let accounts = AccountFileConfig::load(&cfg.accounts_config_path)
        .unwrap_or_else(|e| panic!("Failed to load accounts: {e}"));
    let registry = StrategyRegistry::from_config(&accounts, gateway)
        .unwrap_or_else(|e| panic!("Failed to build strategies: {e}"));
    let pairs: Vec<String> = registry.pairs().iter().map(ToString::to_string).collect();
    info!(
        strategies = registry.strategies().len(),
        pairs = %pairs.join(", "),
        "Accounts loaded"
    );

    // ── Runner ────────────────────────────────────────────────────────────────
    let runner = StrategyRunner::from_registry(price_feed, registry)
        .unwrap_or_else(|e| panic!("Failed to build strategy runner: {e}"));
    tokio::spawn(runner.run());

    // Keep main alive
    info!("Strategy runner started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Exiting.");
}
