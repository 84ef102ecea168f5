// =============================================================================
// SharedBus — thread-safe rendezvous for quote, controls, and snapshot
// =============================================================================
//
// A single parking_lot mutex guards all three slots. Every accessor copies
// in/out of the lock so hold times stay constant and no reference escapes
// the critical section.
// =============================================================================

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Controls, ControlsPatch, EngineState, Label, Quote, Side};

/// Telemetry record published at the end of every engine tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub ts: f64,
    pub state: EngineState,
    pub position_side: Side,
    pub position_qty: u32,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub trades_today: u32,
    pub label: Label,
    pub score: f64,
    pub event_active: bool,
    pub arm: bool,
    pub kill: bool,
    pub flatten: bool,
    pub reject_reason: String,
}

struct BusState {
    quote: Option<Quote>,
    controls: Controls,
    snapshot: Option<EngineSnapshot>,
}

pub struct SharedBus {
    state: Mutex<BusState>,
}

impl SharedBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState {
                quote: None,
                controls: Controls::default(),
                snapshot: None,
            }),
        }
    }

    pub fn set_quote(&self, q: Quote) {
        self.state.lock().quote = Some(q);
    }

    pub fn get_quote(&self) -> Option<Quote> {
        self.state.lock().quote
    }

    /// Merge semantics: only keys present in `patch` overwrite the current
    /// controls; absent keys keep their prior value. This is how a UI can
    /// set just `flatten` without zeroing `arm`/`score`/`event_active`, and
    /// how the engine clears `flatten` back to false after acting on it.
    pub fn set_controls(&self, patch: ControlsPatch) {
        self.state.lock().controls.merge(patch);
    }

    pub fn get_controls(&self) -> Controls {
        self.state.lock().controls
    }

    pub fn set_snapshot(&self, snap: EngineSnapshot) {
        self.state.lock().snapshot = Some(snap);
    }

    pub fn get_snapshot(&self) -> Option<EngineSnapshot> {
        self.state.lock().snapshot.clone()
    }
}

impl Default for SharedBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_roundtrips() {
        let bus = SharedBus::new();
        assert!(bus.get_quote().is_none());
        let q = Quote::new(1.0, 10.0, 9.99, 10.01, 0.01);
        bus.set_quote(q);
        assert_eq!(bus.get_quote(), Some(q));
    }

    #[test]
    fn set_controls_merges_not_replaces_partial() {
        let bus = SharedBus::new();
        bus.set_controls(ControlsPatch { arm: Some(true), score: Some(1.0), ..Default::default() });
        let c = bus.get_controls();
        assert!(c.arm);
        assert_eq!(c.score, 1.0);

        // A patch touching only `flatten` must not zero arm/score.
        bus.set_controls(ControlsPatch { flatten: Some(true), ..Default::default() });
        let c2 = bus.get_controls();
        assert!(c2.arm);
        assert_eq!(c2.score, 1.0);
        assert!(c2.flatten);
    }

    #[test]
    fn single_flatten_per_control_edge() {
        let bus = SharedBus::new();
        bus.set_controls(ControlsPatch { flatten: Some(true), ..Default::default() });
        // Engine handles it, then clears flatten explicitly via the same merge path.
        bus.set_controls(ControlsPatch { flatten: Some(false), ..Default::default() });
        assert!(!bus.get_controls().flatten);
    }
}
