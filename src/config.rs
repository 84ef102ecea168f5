// =============================================================================
// EngineConfig — fully-resolved parameter set, loaded once at startup
// =============================================================================
//
// Resolved once at startup into a typed struct with every field defaulted,
// so per-tick reads are allocation-free. Loaded from a YAML document
// (`config.yaml`) via serde_yaml, falling back to built-in defaults with a
// warning if the file is absent.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_mode() -> String {
    "PAPER".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub event: EventSection,
    #[serde(default)]
    pub execution: ExecutionSection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            engine: EngineSection::default(),
            risk: RiskSection::default(),
            event: EventSection::default(),
            execution: ExecutionSection::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `path`, falling back to defaults (with a warning) if the
    /// file does not exist or fails to parse. Missing config is not a
    /// reason to refuse to start a paper engine.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let cfg: EngineConfig = serde_yaml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("failed to parse {path}: {e}"))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                warn!(path, "config file not found, falling back to defaults");
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.event.neutral_z <= self.event.signif_z && self.event.signif_z <= self.event.shock_z) {
            anyhow::bail!("event thresholds must satisfy neutral_z <= signif_z <= shock_z");
        }
        if self.engine.tick_size <= 0.0 {
            anyhow::bail!("engine.tick_size must be positive");
        }
        if self.engine.loop_hz == 0 {
            anyhow::bail!("engine.loop_hz must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    #[serde(default = "default_loop_hz")]
    pub loop_hz: u32,
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

fn default_tick_size() -> f64 { 0.01 }
fn default_loop_hz() -> u32 { 4 }
fn default_log_path() -> String { "logs/engine.log".to_string() }

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_size: default_tick_size(),
            loop_hz: default_loop_hz(),
            log_path: default_log_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSection {
    #[serde(default = "default_base_size")]
    pub base_size: u32,
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
}

fn default_base_size() -> u32 { 1 }
fn default_max_trades_per_day() -> u32 { 3 }
fn default_max_daily_loss() -> f64 { 500.0 }

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            base_size: default_base_size(),
            max_trades_per_day: default_max_trades_per_day(),
            max_daily_loss: default_max_daily_loss(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSection {
    #[serde(default = "default_neutral_z")]
    pub neutral_z: f64,
    #[serde(default = "default_signif_z")]
    pub signif_z: f64,
    #[serde(default = "default_shock_z")]
    pub shock_z: f64,
}

fn default_neutral_z() -> f64 { 0.5 }
fn default_signif_z() -> f64 { 1.0 }
fn default_shock_z() -> f64 { 2.0 }

impl Default for EventSection {
    fn default() -> Self {
        Self {
            neutral_z: default_neutral_z(),
            signif_z: default_signif_z(),
            shock_z: default_shock_z(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_max_spread_ticks")]
    pub max_spread_ticks: i64,
    #[serde(default = "default_confirm_seconds")]
    pub confirm_seconds: f64,
    #[serde(default = "default_range_build_sec")]
    pub range_build_sec: f64,
    #[serde(default = "default_range_break_ticks")]
    pub range_break_ticks: i64,
    /// Thresholds below have no single canonical value; see DESIGN.md for
    /// how these defaults were picked.
    #[serde(default = "default_impulse_ticks_shock")]
    pub impulse_ticks_shock: i64,
    #[serde(default = "default_impulse_ticks_signif")]
    pub impulse_ticks_signif: i64,
    #[serde(default = "default_velocity_ticks_per_sec")]
    pub velocity_ticks_per_sec: f64,
    #[serde(default = "default_persistence_n")]
    pub persistence_n: usize,
    #[serde(default = "default_retrace_ticks")]
    pub retrace_ticks: i64,
    #[serde(default = "default_fail_fast_sec")]
    pub fail_fast_sec: f64,
    #[serde(default = "default_no_follow_sec")]
    pub no_follow_sec: f64,
    #[serde(default = "default_no_follow_min_pnl")]
    pub no_follow_min_pnl: f64,
    #[serde(default = "default_trail_min_ticks")]
    pub trail_min_ticks: f64,
    #[serde(default = "default_trail_min_ticks_tight")]
    pub trail_min_ticks_tight: f64,
    #[serde(default = "default_trail_vol_mult")]
    pub trail_vol_mult: f64,
    #[serde(default = "default_tighten_after_sec")]
    pub tighten_after_sec: f64,
    #[serde(default = "default_breakeven_after_ticks")]
    pub breakeven_after_ticks: i64,
    #[serde(default = "default_hold_max_min")]
    pub hold_max_min: f64,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
}

fn default_max_spread_ticks() -> i64 { 4 }
fn default_confirm_seconds() -> f64 { 8.0 }
fn default_range_build_sec() -> f64 { 3.0 }
fn default_range_break_ticks() -> i64 { 2 }
fn default_impulse_ticks_shock() -> i64 { 8 }
fn default_impulse_ticks_signif() -> i64 { 10 }
fn default_velocity_ticks_per_sec() -> f64 { 1.5 }
fn default_persistence_n() -> usize { 3 }
fn default_retrace_ticks() -> i64 { 3 }
fn default_fail_fast_sec() -> f64 { 15.0 }
fn default_no_follow_sec() -> f64 { 25.0 }
fn default_no_follow_min_pnl() -> f64 { 0.05 }
fn default_trail_min_ticks() -> f64 { 10.0 }
fn default_trail_min_ticks_tight() -> f64 { 6.0 }
fn default_trail_vol_mult() -> f64 { 1.5 }
fn default_tighten_after_sec() -> f64 { 120.0 }
fn default_breakeven_after_ticks() -> i64 { 8 }
fn default_hold_max_min() -> f64 { 60.0 }
fn default_cooldown_seconds() -> f64 { 120.0 }

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            max_spread_ticks: default_max_spread_ticks(),
            confirm_seconds: default_confirm_seconds(),
            range_build_sec: default_range_build_sec(),
            range_break_ticks: default_range_break_ticks(),
            impulse_ticks_shock: default_impulse_ticks_shock(),
            impulse_ticks_signif: default_impulse_ticks_signif(),
            velocity_ticks_per_sec: default_velocity_ticks_per_sec(),
            persistence_n: default_persistence_n(),
            retrace_ticks: default_retrace_ticks(),
            fail_fast_sec: default_fail_fast_sec(),
            no_follow_sec: default_no_follow_sec(),
            no_follow_min_pnl: default_no_follow_min_pnl(),
            trail_min_ticks: default_trail_min_ticks(),
            trail_min_ticks_tight: default_trail_min_ticks_tight(),
            trail_vol_mult: default_trail_vol_mult(),
            tighten_after_sec: default_tighten_after_sec(),
            breakeven_after_ticks: default_breakeven_after_ticks(),
            hold_max_min: default_hold_max_min(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.mode, "PAPER");
        assert_eq!(cfg.engine.tick_size, 0.01);
        assert_eq!(cfg.engine.loop_hz, 4);
        assert_eq!(cfg.risk.base_size, 1);
        assert_eq!(cfg.risk.max_trades_per_day, 3);
        assert_eq!(cfg.risk.max_daily_loss, 500.0);
        assert_eq!(cfg.event.neutral_z, 0.5);
        assert_eq!(cfg.event.signif_z, 1.0);
        assert_eq!(cfg.event.shock_z, 2.0);
        assert_eq!(cfg.execution.max_spread_ticks, 4);
        assert_eq!(cfg.execution.confirm_seconds, 8.0);
        assert_eq!(cfg.execution.cooldown_seconds, 120.0);
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.event.signif_z = 0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_falls_back_to_defaults_when_missing() {
        let cfg = EngineConfig::load("/nonexistent/path/config.yaml").unwrap();
        assert_eq!(cfg.mode, "PAPER");
    }

    #[test]
    fn load_parses_partial_yaml_with_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("reaction_engine_test_config.yaml");
        std::fs::write(&path, "risk:\n  max_trades_per_day: 7\n").unwrap();
        let cfg = EngineConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.risk.max_trades_per_day, 7);
        assert_eq!(cfg.risk.base_size, 1);
        let _ = std::fs::remove_file(&path);
    }
}
