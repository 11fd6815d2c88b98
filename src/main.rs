mod aggregator;
mod api;
mod config;
mod db;
mod decoder;
mod explorer;
mod indexer;
mod mapping;
mod models;
mod networks;
mod parser;
mod rpc;
mod selectors;
mod subgraph;
mod units;

use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("BNB scope starting...");

    let cfg = config::load()?;
    info!("  Network: {} (chain {})", cfg.network.name, cfg.network.chain_id);
    info!("  RPC URL: {}", cfg.rpc_http_url);
    info!("  Subgraph: {}", cfg.subgraph_url);
    info!("  DB Path: {}", cfg.db_path);
    info!("  Port: {}", cfg.port);
    info!("  Confirmations: {}", cfg.confirmations);
    info!("  Contracts tracked: {:?}", cfg.token_set);

    // Run DB migrations once at startup
    {
        let conn = db::connect(&cfg.db_path)?;
        db::run_migrations(&conn)?;
    }

    let shared_conn = Arc::new(Mutex::new(db::connect(&cfg.db_path)?));

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { api::serve(cfg, conn).await }
    });

    let indexer_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { indexer::run(cfg, conn).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = indexer_handle => match res {
            Ok(Ok(_)) => info!("Indexer exited cleanly"),
            Ok(Err(e)) => error!("Indexer error: {:?}", e),
            Err(e) => error!("Indexer task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("BNB scope stopped.");
    Ok(())
}
