//! txnsentinel -- Transaction anomaly monitoring for payment-gateway dashboards.
//!
//! This crate provides the anomaly classifier for per-merchant,
//! per-payment-method transaction series, plus the service around it: a
//! monitoring data client, a polling scheduler, and an HTTP API.

pub mod api;
pub mod config;
pub mod detect;
pub mod scheduler;
pub mod source;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SentinelConfig;
use crate::scheduler::{Poller, VerdictBoard};
use crate::source::http::HttpSource;

/// Build an HTTP monitoring source from configuration.
pub fn http_source(config: &SentinelConfig) -> Result<HttpSource> {
    HttpSource::new(
        &config.source.base_url,
        config.source.api_token.clone(),
        config.source.timeout(),
    )
    .context("failed to build monitoring client")
}

/// Start the txnsentinel daemon: poller and API server.
pub async fn serve(bind: &str, config: SentinelConfig) -> Result<()> {
    // 1. Monitoring source
    tracing::info!(base_url = %config.source.base_url, "Connecting monitoring source");
    let source = Arc::new(http_source(&config)?);

    // 2. Poller (background task)
    let board = VerdictBoard::new();
    let poller = Poller::new(
        source,
        config.policy.clone(),
        config.polling.windows.clone(),
        board.clone(),
    );
    tokio::spawn(scheduler::run_poll_loop(poller, config.polling.interval()));

    // 3. API server
    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", bind))?;
    let app = api::router(api::state::AppState {
        board,
        policy: config.policy,
    });

    tracing::info!(%addr, "txnsentinel listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
