//! Flight Oracle Server
//!
//! Registers the oracle pool, answers status requests emitted by the app
//! contract, and serves the flight projection over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flight_oracle_server::app_state::AppState;
use flight_oracle_server::config::ServerConfig;
use flight_oracle_server::engine::OracleEngine;
use flight_oracle_server::ledger::{LedgerClient, RpcLedgerClient};
use flight_oracle_server::routes::app_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    let ledger: Arc<dyn LedgerClient> = Arc::new(
        RpcLedgerClient::new(
            config.ledger_rpc_url.clone(),
            config.contracts.clone(),
            config.rpc_timeout,
            config.event_poll_interval,
        )
        .context("cannot build ledger client")?,
    );
    info!(url = %config.ledger_rpc_url, "Ledger gateway configured");

    let engine = OracleEngine::new(config.clone(), ledger);
    let subscriptions = engine.start().await;
    tokio::spawn(async move {
        subscriptions.join().await;
        warn!("All ledger event streams ended");
    });

    let app = app_router(AppState::new(Arc::clone(&engine.projection)), &config.cors_allowed_origins);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
