// =============================================================================
// Reaction Engine — Main Entry Point
// =============================================================================
//
// Single-symbol, event-reactive paper trading engine. Wires configuration,
// the engine log, the shared bus, the trading engine, the demo quote feed,
// and the control/telemetry HTTP surface, then runs until interrupted.
// =============================================================================

mod api;
mod bus;
mod config;
mod driver;
mod engine;
mod error;
mod feed;
mod label;
mod logger;
mod position;
mod rolling;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::bus::SharedBus;
use crate::config::EngineConfig;
use crate::engine::TradingEngine;
use crate::feed::SineWalkQuoteFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("reaction engine starting up");

    let config = EngineConfig::load("config.yaml").unwrap_or_else(|e| {
        warn!(error = %e, "invalid config, using defaults");
        EngineConfig::default()
    });

    info!(
        mode = %config.mode,
        tick_size = config.engine.tick_size,
        loop_hz = config.engine.loop_hz,
        "configuration resolved"
    );

    let now = now_secs();
    let bus = Arc::new(SharedBus::new());
    let loop_hz = config.engine.loop_hz;
    let tick_size = config.engine.tick_size;
    let engine = TradingEngine::new(config, now);
    let feed: Box<dyn driver::QuoteSource> = Box::new(SineWalkQuoteFeed::new(tick_size, now));

    let driver_bus = bus.clone();
    tokio::spawn(async move {
        driver::run_driver(engine, driver_bus, feed, loop_hz).await;
    });

    let bind_addr = std::env::var("REACTION_ENGINE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let api_bus = bus.clone();
    tokio::spawn(async move {
        let app = api::router(api_bus);
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "failed to bind control surface");
                return;
            }
        };
        info!(addr = %bind_addr, "control surface listening");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "control surface server failed");
        }
    });

    info!("engine running. press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received");

    Ok(())
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
