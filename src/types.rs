// =============================================================================
// Shared types used across the reaction engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single quote tick from the market: last trade plus top of book.
///
/// `bid <= last <= ask` is expected of every producer; `Quote::new`
/// debug-asserts it so a misbehaving feed fails fast in tests instead of
/// silently corrupting gate math downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ts: f64,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread_ticks: i64,
}

impl Quote {
    pub fn new(ts: f64, last: f64, bid: f64, ask: f64, tick_size: f64) -> Self {
        debug_assert!(bid <= last && last <= ask, "quote invariant bid<=last<=ask violated");
        let spread_ticks = ((ask - bid) / tick_size).round() as i64;
        Self { ts, last, bid, ask, spread_ticks }
    }
}

/// Resolved control inputs, as read by the engine every tick. Unknown wire
/// keys are ignored by construction; missing keys default to the falsy
/// values below. Built up from successive `ControlsPatch` merges, never
/// deserialized directly off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Controls {
    pub arm: bool,
    pub kill: bool,
    pub flatten: bool,
    pub score: f64,
    pub event_active: bool,
}

/// A partial control update: only keys present in the wire payload carry a
/// value, everything else is `None` and leaves the prior `Controls` value
/// untouched. This is what `POST /controls` deserializes and what the
/// engine itself uses to clear `flatten` after acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlsPatch {
    #[serde(default)]
    pub arm: Option<bool>,
    #[serde(default)]
    pub kill: Option<bool>,
    #[serde(default)]
    pub flatten: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub event_active: Option<bool>,
}

impl Controls {
    /// Merge semantics used by `SharedBus::set_controls`: only keys present
    /// in `patch` overwrite the corresponding field; absent keys keep their
    /// existing value.
    pub fn merge(&mut self, patch: ControlsPatch) {
        if let Some(v) = patch.arm {
            self.arm = v;
        }
        if let Some(v) = patch.kill {
            self.kill = v;
        }
        if let Some(v) = patch.flatten {
            self.flatten = v;
        }
        if let Some(v) = patch.score {
            self.score = v;
        }
        if let Some(v) = patch.event_active {
            self.event_active = v;
        }
    }
}

/// Which side of the book a position is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Flat,
    Long,
    Short,
}

impl Default for Side {
    fn default() -> Self {
        Self::Flat
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => write!(f, "FLAT"),
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Coarse classification of an event score's magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Neutral,
    Signif,
    Shock,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Signif => write!(f, "SIGNIF"),
            Self::Shock => write!(f, "SHOCK"),
        }
    }
}

/// High-level engine state. Derived fresh each tick from inputs; stored only
/// for reporting in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Armed,
    InTrade,
    Cooldown,
    Halt,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Armed => write!(f, "ARMED"),
            Self::InTrade => write!(f, "IN_TRADE"),
            Self::Cooldown => write!(f, "COOLDOWN"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overwrites_present_keys() {
        let mut c = Controls { arm: true, kill: false, flatten: false, score: 1.5, event_active: true };
        c.merge(ControlsPatch { flatten: Some(true), ..Default::default() });
        assert!(c.arm);
        assert!(c.flatten);
        assert_eq!(c.score, 1.5);
        assert!(c.event_active);
    }

    #[test]
    fn merge_empty_patch_is_a_noop() {
        let original = Controls { arm: true, kill: true, flatten: false, score: 2.0, event_active: true };
        let mut c = original;
        c.merge(ControlsPatch::default());
        assert_eq!(c, original);
    }

    #[test]
    fn patch_with_only_flatten_deserializes_from_partial_json() {
        let patch: ControlsPatch = serde_json::from_str(r#"{"flatten": true}"#).unwrap();
        assert_eq!(patch.flatten, Some(true));
        assert_eq!(patch.arm, None);
        assert_eq!(patch.score, None);
    }
}
