// =============================================================================
// Driver loop — fixed-cadence pull/push/tick/publish cycle
// =============================================================================
//
// Runs as a single Tokio task: every tick, pull a fresh quote from the
// configured source and push it onto the bus, read the latest merged
// controls off the bus, invoke the engine synchronously, and publish the
// resulting snapshot. The tick itself never awaits, matching the
// runs-to-completion engine model; only this loop's own interval sleeps.
// =============================================================================

use std::time::Duration;

use tokio::time::interval;
use tracing::info;

use crate::bus::SharedBus;
use crate::engine::TradingEngine;
use crate::types::{ControlsPatch, Quote};

/// Any producer of quotes. The demo binary uses `SineWalkQuoteFeed`; a real
/// deployment would swap in a live market-data adapter here without
/// touching the engine or the bus.
pub trait QuoteSource: Send {
    fn next_quote(&mut self, now: f64) -> Option<Quote>;
}

/// Run the driver loop forever at `loop_hz`. Intended to be spawned once at
/// startup and to run for the lifetime of the process; it terminates only
/// when the surrounding Tokio task is cancelled.
pub async fn run_driver(
    mut engine: TradingEngine,
    bus: std::sync::Arc<SharedBus>,
    mut feed: Box<dyn QuoteSource>,
    loop_hz: u32,
) {
    let period = Duration::from_secs_f64(1.0 / loop_hz.max(1) as f64);
    let mut ticker = interval(period);
    info!(loop_hz, "driver loop started");

    loop {
        ticker.tick().await;

        let now = now_secs();
        if let Some(quote) = feed.next_quote(now) {
            bus.set_quote(quote);
        }

        let quote = bus.get_quote();
        let controls = bus.get_controls();

        if let Some(snapshot) = engine.tick(quote, controls, now) {
            // The engine may have actioned and cleared `flatten` internally
            // (snapshot.flatten reflects the post-tick value); persist that
            // back through the same merge path so a transient flatten pulse
            // does not re-fire on the next tick, without touching arm/score.
            bus.set_controls(ControlsPatch { flatten: Some(snapshot.flatten), ..Default::default() });
            bus.set_snapshot(snapshot);
        }
    }
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
