//! testpulse -- Analytics aggregation engine for test-automation dashboards.
//!
//! This crate merges paginated project and execution collections from a
//! test-automation backend, normalizes their loosely-typed records, and
//! derives success rates, a daily trend and a package distribution.

pub mod analysis;
pub mod api;
pub mod client;
pub mod config;
pub mod refresh;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::stats::StatsService;
use crate::config::Config;
use crate::refresh::StatsStore;

/// Start the testpulse daemon: background refresh plus the JSON API.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Build the stats service against the configured upstream
    tracing::info!(upstream = %config.upstream.base_url, "Initializing upstream client");
    let service = Arc::new(StatsService::from_config(&config)?);
    let store = StatsStore::new();

    // 2. Start background refresh
    let every = Duration::from_secs(config.refresh.interval_secs.max(1));
    let refresh_service = service.clone();
    let refresh_store = store.clone();
    tokio::spawn(async move {
        refresh::run_refresh_loop(refresh_service, refresh_store, every).await;
    });

    // 3. Start API server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    let app = api::router(api::state::AppState { service, store });

    tracing::info!(%addr, "testpulse listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
