//! SpeedFinder -- network speed, data usage and LAN discovery toolkit.
//!
//! This crate provides the download speed sampler, the subnet device
//! scanner, the daily usage ledger with limit alerts, and the small HTTP
//! API that exposes their history.

pub mod api;
pub mod config;
pub mod monitor;
pub mod netinfo;
pub mod scan;
pub mod speedtest;
pub mod storage;
pub mod usage;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Start the SpeedFinder daemon: usage monitor plus API server.
pub async fn serve(bind: &str, cfg: config::Config) -> Result<()> {
    tracing::info!(db_path = %cfg.db_path, "Initializing database");
    let pool = storage::open_pool(&cfg.db_path)?;

    // The monitor feeds the ledger in the background for as long as the
    // server runs; Ctrl-C cancels it before the listener shuts down.
    let cancel = CancellationToken::new();
    let monitor_pool = pool.clone();
    let monitor_cfg = cfg.monitor.clone();
    let monitor_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = monitor::run(monitor_pool, monitor_cfg, monitor_cancel, false).await {
            tracing::error!("monitor task failed: {:#}", e);
        }
    });

    let state = api::state::AppState { pool };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, "SpeedFinder listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
    }
    cancel.cancel();
}
