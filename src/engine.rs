// =============================================================================
// TradingEngine — the state machine at the heart of the reaction engine
// =============================================================================
//
// High-level state is derived fresh every tick from inputs (kill/arm,
// cooldown expiry, position flatness, risk limits); it is stored only for
// reporting in the published snapshot. See the precedence table in the
// design notes for the exact transition ordering this implements.
// =============================================================================

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::bus::EngineSnapshot;
use crate::config::EngineConfig;
use crate::label::label_from_score;
use crate::logger::EngineLog;
use crate::position::PaperBroker;
use crate::rolling::RollingPriceWindow;
use crate::types::{Controls, EngineState, Label, Quote, Side};

/// Event-window tracking memory, reset on entry or event expiry.
#[derive(Debug, Default)]
struct EventMemory {
    ref_price: Option<f64>,
    ref_time: Option<f64>,
    peak_ticks: i64,
    trough_ticks: i64,
    range_high: Option<f64>,
    range_low: Option<f64>,
    range_done: bool,
}

impl EventMemory {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn has_ref(&self) -> bool {
        self.ref_price.is_some()
    }
}

/// Rolling-day trade count, rolled whenever the calendar date advances.
struct DailyCounters {
    day: NaiveDate,
    trades_today: u32,
}

impl DailyCounters {
    fn new(today: NaiveDate) -> Self {
        Self { day: today, trades_today: 0 }
    }

    /// Returns true if this call crossed into a new day.
    fn maybe_reset(&mut self, today: NaiveDate) -> bool {
        if today != self.day {
            self.day = today;
            self.trades_today = 0;
            true
        } else {
            false
        }
    }
}

/// Post-exit / post-reject wait; cleared implicitly once `now` passes it.
#[derive(Default)]
struct Cooldown {
    cooldown_until: Option<f64>,
}

impl Cooldown {
    fn is_active(&self, now: f64) -> bool {
        self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }

    fn set(&mut self, now: f64, seconds: f64) {
        self.cooldown_until = Some(now + seconds);
    }
}

fn naive_date_from_secs(ts: f64) -> NaiveDate {
    chrono::DateTime::<Utc>::from_timestamp(ts as i64, 0)
        .unwrap_or_else(|| chrono::DateTime::<Utc>::from_timestamp(0, 0).unwrap())
        .date_naive()
}

pub struct TradingEngine {
    config: EngineConfig,
    broker: PaperBroker,
    window: RollingPriceWindow,
    memory: EventMemory,
    daily: DailyCounters,
    cooldown: Cooldown,
    breakeven_armed: bool,
    state: EngineState,
    log: EngineLog,
}

impl TradingEngine {
    pub fn new(config: EngineConfig, now: f64) -> Self {
        let log = EngineLog::open(&config.engine.log_path);
        Self {
            daily: DailyCounters::new(naive_date_from_secs(now)),
            broker: PaperBroker::new(),
            window: RollingPriceWindow::new(),
            memory: EventMemory::default(),
            cooldown: Cooldown::default(),
            breakeven_armed: false,
            state: EngineState::Idle,
            config,
            log,
        }
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    fn rollover(&mut self, now: f64) {
        let today = naive_date_from_secs(now);
        if self.daily.maybe_reset(today) {
            self.log.info("New day");
        }
    }

    /// Advance the engine by one tick. Returns `None` (no side effects, no
    /// snapshot) if `quote` is absent.
    pub fn tick(&mut self, quote: Option<Quote>, mut controls: Controls, now: f64) -> Option<EngineSnapshot> {
        let quote = quote?;
        self.window.push(quote.last);
        self.rollover(now);

        let label = label_from_score(
            controls.score,
            self.config.event.neutral_z,
            self.config.event.signif_z,
            self.config.event.shock_z,
        );

        // Rule 1: kill dominates everything.
        if controls.kill {
            if !self.broker.position().is_flat() {
                let pnl = self.broker.flatten(&quote);
                info!(pnl, "kill switch: position flattened");
            }
            self.state = EngineState::Halt;
            return Some(self.publish(&quote, &controls, label, "Kill switch active".to_string(), now));
        }

        // Rule 2: flatten request, fall through rather than return.
        if controls.flatten && !self.broker.position().is_flat() {
            let pnl = self.broker.exit(&quote);
            self.cooldown.set(now, self.config.execution.cooldown_seconds);
            self.breakeven_armed = false;
            controls.flatten = false;
            info!(pnl, "flatten request: position closed");
        }

        // Rule 3: daily loss circuit breaker.
        if self.broker.realized_pnl() <= -self.config.risk.max_daily_loss {
            if !self.broker.position().is_flat() {
                let pnl = self.broker.flatten(&quote);
                warn!(pnl, "max daily loss: position flattened");
            }
            self.state = EngineState::Halt;
            return Some(self.publish(&quote, &controls, label, "Max daily loss reached".to_string(), now));
        }

        // Rule 4: disarmed.
        if !controls.arm {
            self.memory.reset();
            self.state = EngineState::Idle;
            return Some(self.publish(&quote, &controls, label, "Not armed".to_string(), now));
        }

        // Rule 5: cooldown.
        if self.cooldown.is_active(now) {
            self.state = EngineState::Cooldown;
            return Some(self.publish(&quote, &controls, label, "Cooldown active".to_string(), now));
        }

        // Rule 6: spread gate while flat.
        if self.broker.position().is_flat() && quote.spread_ticks > self.config.execution.max_spread_ticks {
            self.state = EngineState::Armed;
            return Some(self.publish(&quote, &controls, label, "Spread too wide".to_string(), now));
        }

        // Rule 7 / 8.
        let reject_reason = if self.broker.position().is_flat() {
            self.run_entry_pipeline(&quote, &controls, label, now)
        } else {
            self.run_management_pipeline(&quote, now)
        };

        Some(self.publish(&quote, &controls, label, reject_reason, now))
    }

    fn run_entry_pipeline(&mut self, quote: &Quote, controls: &Controls, label: Label, now: f64) -> String {
        let exec = self.config.execution.clone();

        // 1. Event not active.
        if !controls.event_active {
            self.memory.reset();
            self.state = EngineState::Armed;
            return "Waiting EVENT_ACTIVE".to_string();
        }

        // 2. First quote of this event window.
        if !self.memory.has_ref() {
            self.memory.ref_price = Some(quote.last);
            self.memory.ref_time = Some(now);
            self.memory.range_high = Some(quote.last);
            self.memory.range_low = Some(quote.last);
            self.memory.range_done = false;
            self.state = EngineState::Armed;
            return "Tracking event".to_string();
        }

        // 3. Daily trade cap.
        if self.daily.trades_today >= self.config.risk.max_trades_per_day {
            self.state = EngineState::Halt;
            return "Max trades per day reached".to_string();
        }

        // 4. Neutral label: no trade.
        if label == Label::Neutral {
            self.state = EngineState::Armed;
            return "Label NEUTRAL".to_string();
        }

        let ref_time = self.memory.ref_time.expect("ref_time set once ref_price is set");
        let ref_price = self.memory.ref_price.expect("ref_price checked above");
        let elapsed = now - ref_time;

        // 5. Confirm window expiry.
        if elapsed > exec.confirm_seconds {
            self.cooldown.set(now, exec.cooldown_seconds);
            self.memory.reset();
            self.state = EngineState::Armed;
            return "Confirm window expired".to_string();
        }

        // 6. Range build. The window closes once `elapsed` first reaches
        // range_build_sec; the tick that closes it is treated as the first
        // post-range tick (its `last` is the breakout candidate, not folded
        // into range_high/low), so breakout/impulse gates below run in the
        // same tick rather than waiting one extra tick for a fresh quote.
        if !self.memory.range_done {
            if elapsed >= exec.range_build_sec {
                self.memory.range_done = true;
            } else {
                let high = self.memory.range_high.unwrap_or(quote.last).max(quote.last);
                let low = self.memory.range_low.unwrap_or(quote.last).min(quote.last);
                self.memory.range_high = Some(high);
                self.memory.range_low = Some(low);
                self.state = EngineState::Armed;
                return "Building range".to_string();
            }
        }

        // 7. Desired direction.
        let want_side = if controls.score > 0.0 { Side::Long } else { Side::Short };

        // 8. Impulse threshold selection.
        let impulse_ticks = if label == Label::Shock { exec.impulse_ticks_shock } else { exec.impulse_ticks_signif };

        // 9. Move in ticks, update peak/trough.
        let move_ticks = ((quote.last - ref_price) / self.config.engine.tick_size).round() as i64;
        self.memory.peak_ticks = self.memory.peak_ticks.max(move_ticks);
        self.memory.trough_ticks = self.memory.trough_ticks.min(move_ticks);

        // 10. Impulse gate.
        let impulse_ok = match want_side {
            Side::Long => move_ticks >= impulse_ticks,
            Side::Short => move_ticks <= -impulse_ticks,
            Side::Flat => false,
        };
        if !impulse_ok {
            self.state = EngineState::Armed;
            return "Impulse too small".to_string();
        }

        // 11. Velocity gate.
        let velocity = (move_ticks.abs() as f64) / elapsed.max(0.001);
        if velocity < exec.velocity_ticks_per_sec {
            self.state = EngineState::Armed;
            return "Velocity too low".to_string();
        }

        // 12. Persistence gate.
        if !self.window.persistence_ok(want_side, exec.persistence_n) {
            self.state = EngineState::Armed;
            return "Persistence check failed".to_string();
        }

        // 13. Breakout gate.
        let range_high = self.memory.range_high.unwrap_or(quote.last);
        let range_low = self.memory.range_low.unwrap_or(quote.last);
        let breakout_ok = match want_side {
            Side::Long => quote.last >= range_high + exec.range_break_ticks as f64 * self.config.engine.tick_size,
            Side::Short => quote.last <= range_low - exec.range_break_ticks as f64 * self.config.engine.tick_size,
            Side::Flat => false,
        };
        if !breakout_ok {
            self.state = EngineState::Armed;
            return "Breakout level not reached".to_string();
        }

        // 14. Anti-fake retrace.
        let retr = match want_side {
            Side::Long => self.memory.peak_ticks - move_ticks,
            Side::Short => move_ticks - self.memory.trough_ticks,
            Side::Flat => 0,
        };
        if retr > exec.retrace_ticks {
            self.cooldown.set(now, exec.cooldown_seconds);
            self.memory.reset();
            self.state = EngineState::Armed;
            return "Anti-fake retrace".to_string();
        }

        // 15. Enter.
        let qty = self.config.risk.base_size.max(1);
        self.broker
            .enter(want_side, qty, quote, now)
            .expect("broker precondition: engine only enters from the flat branch");
        self.daily.trades_today += 1;
        self.memory.reset();
        self.breakeven_armed = false;
        self.state = EngineState::InTrade;
        info!(side = %want_side, price = quote.last, trades_today = self.daily.trades_today, "entry");
        String::new()
    }

    fn run_management_pipeline(&mut self, quote: &Quote, now: f64) -> String {
        let exec = &self.config.execution;
        let tick_size = self.config.engine.tick_size;

        self.broker.update_best_price(quote);
        let side = self.broker.position().side;
        let entry_time = self.broker.position().entry_time.expect("position invariant: entry_time set while not flat");
        let entry_price = self.broker.position().entry_price;
        let best = self.broker.position().best_price;
        let tit = now - entry_time;
        let unreal = self.broker.mark_unrealized(quote);

        let mut exit_reason: Option<&'static str> = None;

        // Fail-fast.
        if tit >= exec.fail_fast_sec && unreal < 0.0 {
            exit_reason = Some("Fail-fast exit");
        }

        // No follow-through.
        if exit_reason.is_none() && tit >= exec.no_follow_sec && unreal < exec.no_follow_min_pnl {
            exit_reason = Some("No follow-through");
        }

        // Dynamic trailing.
        if exit_reason.is_none() {
            let vol_ticks = self.window.volatility_ticks(tick_size);
            let mut dyn_ticks = exec.trail_min_ticks.max(exec.trail_vol_mult * vol_ticks);
            if tit >= exec.tighten_after_sec {
                dyn_ticks = exec.trail_min_ticks_tight.max(dyn_ticks * 0.8);
            }
            let trail_price = dyn_ticks * tick_size;
            let triggered = match side {
                Side::Long => quote.bid < best - trail_price,
                Side::Short => quote.ask > best + trail_price,
                Side::Flat => false,
            };
            if triggered {
                exit_reason = Some(match side {
                    Side::Long => "Trailing exit (long)",
                    Side::Short => "Trailing exit (short)",
                    Side::Flat => "Trailing exit",
                });
            }
        }

        // Breakeven is evaluated after trailing, not before.
        if exit_reason.is_none() {
            let favorable = match side {
                Side::Long => best - entry_price,
                Side::Short => entry_price - best,
                Side::Flat => 0.0,
            };
            if favorable >= exec.breakeven_after_ticks as f64 * tick_size {
                self.breakeven_armed = true;
            }
            if self.breakeven_armed {
                let working_price = match side {
                    Side::Long => quote.bid,
                    Side::Short => quote.ask,
                    Side::Flat => entry_price,
                };
                let touched = match side {
                    Side::Long => working_price <= entry_price,
                    Side::Short => working_price >= entry_price,
                    Side::Flat => false,
                };
                if touched {
                    exit_reason = Some("Breakeven exit");
                }
            }
        }

        // Time exit.
        if exit_reason.is_none() && tit >= exec.hold_max_min * 60.0 {
            exit_reason = Some("Time exit");
        }

        if let Some(reason) = exit_reason {
            let pnl = self.broker.exit(quote);
            self.cooldown.set(now, exec.cooldown_seconds);
            self.breakeven_armed = false;
            self.state = EngineState::Cooldown;
            info!(reason, pnl, "exit");
            reason.to_string()
        } else {
            self.state = EngineState::InTrade;
            String::new()
        }
    }

    fn publish(&mut self, quote: &Quote, controls: &Controls, label: Label, reject_reason: String, now: f64) -> EngineSnapshot {
        let position = *self.broker.position();
        let snapshot = EngineSnapshot {
            ts: now,
            state: self.state,
            position_side: position.side,
            position_qty: position.qty,
            entry_price: position.entry_price,
            unrealized_pnl: self.broker.mark_unrealized(quote),
            realized_pnl: self.broker.realized_pnl(),
            trades_today: self.daily.trades_today,
            label,
            score: controls.score,
            event_active: controls.event_active,
            arm: controls.arm,
            kill: controls.kill,
            flatten: controls.flatten,
            reject_reason,
        };
        if !snapshot.reject_reason.is_empty() {
            self.log.info(&format!("{} | {}", snapshot.state, snapshot.reject_reason));
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn quote(last: f64, bid: f64, ask: f64, tick_size: f64) -> Quote {
        Quote::new(0.0, last, bid, ask, tick_size)
    }

    fn scenario_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.engine.tick_size = 0.01;
        cfg.execution.confirm_seconds = 8.0;
        cfg.execution.range_build_sec = 3.0;
        cfg.execution.range_break_ticks = 2;
        cfg.execution.impulse_ticks_signif = 5;
        cfg.execution.velocity_ticks_per_sec = 0.5;
        cfg.execution.persistence_n = 3;
        cfg.execution.retrace_ticks = 20;
        cfg
    }

    fn armed_controls(score: f64, event_active: bool) -> Controls {
        Controls { arm: true, kill: false, flatten: false, score, event_active }
    }

    #[test]
    fn happy_long_entry() {
        let cfg = scenario_config();
        let mut engine = TradingEngine::new(cfg, 0.0);

        // t=0: event active, establish ref.
        let snap = engine
            .tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), 0.0)
            .unwrap();
        assert_eq!(snap.state, EngineState::Armed);

        // t=0..2: range build.
        for (t, last) in [(0.0, 75.00), (1.0, 75.01), (2.0, 75.02)] {
            let snap = engine
                .tick(Some(quote(last, last - 0.005, last + 0.005, 0.01)), armed_controls(1.5, true), t)
                .unwrap();
            assert_eq!(snap.state, EngineState::Armed);
        }

        // t=3: breakout tick triggers entry.
        let snap = engine
            .tick(Some(quote(75.08, 75.075, 75.085, 0.01)), armed_controls(1.5, true), 3.0)
            .unwrap();
        assert_eq!(snap.state, EngineState::InTrade);
        assert_eq!(snap.trades_today, 1);
        assert!((snap.entry_price - 75.085).abs() < 1e-9);
    }

    #[test]
    fn spread_gate_blocks_entry() {
        let cfg = scenario_config();
        let mut engine = TradingEngine::new(cfg, 0.0);
        let q = Quote::new(0.0, 75.00, 74.95, 75.00, 0.01); // 5 ticks wide
        let snap = engine.tick(Some(q), armed_controls(1.5, true), 0.0).unwrap();
        assert_eq!(snap.state, EngineState::Armed);
        assert!(snap.reject_reason.contains("Spread too wide"));
    }

    #[test]
    fn confirm_window_expiry_sets_cooldown() {
        let cfg = scenario_config();
        let mut engine = TradingEngine::new(cfg, 0.0);
        engine.tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), 0.0);
        for t in 1..9 {
            engine.tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), t as f64);
        }
        let snap = engine
            .tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), 9.0)
            .unwrap();
        assert_eq!(snap.state, EngineState::Armed);
        assert_eq!(snap.reject_reason, "Confirm window expired");
    }

    #[test]
    fn fail_fast_exit_and_daily_halt() {
        let mut cfg = scenario_config();
        cfg.risk.max_daily_loss = 0.05;
        let mut engine = TradingEngine::new(cfg, 0.0);

        engine.tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), 0.0);
        for (t, last) in [(0.0, 75.00), (1.0, 75.01), (2.0, 75.02)] {
            engine.tick(Some(quote(last, last - 0.005, last + 0.005, 0.01)), armed_controls(1.5, true), t);
        }
        let entry_snap = engine
            .tick(Some(quote(75.08, 75.075, 75.085, 0.01)), armed_controls(1.5, true), 3.0)
            .unwrap();
        assert_eq!(entry_snap.state, EngineState::InTrade);

        // t = entry + 16s, losing unrealized.
        let exit_snap = engine
            .tick(Some(quote(75.00, 75.00, 75.005, 0.01)), armed_controls(1.5, true), 19.0)
            .unwrap();
        assert!(exit_snap.realized_pnl < 0.0);

        // Next tick: HALT due to max daily loss.
        let halt_snap = engine
            .tick(Some(quote(75.00, 75.00, 75.005, 0.01)), armed_controls(1.5, true), 20.0)
            .unwrap();
        assert_eq!(halt_snap.state, EngineState::Halt);
    }

    #[test]
    fn kill_dominance_flattens_and_halts() {
        let cfg = scenario_config();
        let mut engine = TradingEngine::new(cfg, 0.0);
        engine.tick(Some(quote(75.00, 74.995, 75.005, 0.01)), armed_controls(1.5, true), 0.0);
        for (t, last) in [(0.0, 75.00), (1.0, 75.01), (2.0, 75.02)] {
            engine.tick(Some(quote(last, last - 0.005, last + 0.005, 0.01)), armed_controls(1.5, true), t);
        }
        engine.tick(Some(quote(75.08, 75.075, 75.085, 0.01)), armed_controls(1.5, true), 3.0);

        let mut kill_controls = armed_controls(1.5, true);
        kill_controls.kill = true;
        let snap = engine
            .tick(Some(quote(75.20, 75.20, 75.21, 0.01)), kill_controls, 4.0)
            .unwrap();
        assert_eq!(snap.state, EngineState::Halt);
        assert_eq!(snap.position_side, Side::Flat);
        assert!(snap.realized_pnl > 0.0);
    }
}
