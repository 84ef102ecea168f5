// =============================================================================
// RollingPriceWindow — bounded history of recent `last` prices
// =============================================================================
//
// Backs two pieces of gate math: the persistence check (last n prices
// strictly monotonic) and the dynamic-trailing volatility estimate
// (population stdev of first differences over the last 30 samples).
// =============================================================================

use std::collections::VecDeque;

use crate::types::Side;

const MAX_LEN: usize = 60;
const VOL_SAMPLE: usize = 30;
const VOL_MIN_SAMPLES: usize = 12;

pub struct RollingPriceWindow {
    prices: VecDeque<f64>,
}

impl RollingPriceWindow {
    pub fn new() -> Self {
        Self { prices: VecDeque::with_capacity(MAX_LEN) }
    }

    pub fn push(&mut self, last: f64) {
        if self.prices.len() == MAX_LEN {
            self.prices.pop_front();
        }
        self.prices.push_back(last);
    }

    /// True if the last `n` prices are strictly monotonic in the direction
    /// implied by `side`. `n <= 1` auto-passes. Fewer than `n` samples fails.
    pub fn persistence_ok(&self, side: Side, n: usize) -> bool {
        if n <= 1 {
            return true;
        }
        if self.prices.len() < n {
            return false;
        }
        let tail: Vec<f64> = self.prices.iter().rev().take(n).rev().copied().collect();
        match side {
            Side::Long => tail.windows(2).all(|w| w[1] > w[0]),
            Side::Short => tail.windows(2).all(|w| w[1] < w[0]),
            Side::Flat => false,
        }
    }

    /// Population stdev of first differences over the last `VOL_SAMPLE`
    /// prices, expressed in ticks. Returns 0 for fewer than
    /// `VOL_MIN_SAMPLES` samples — degenerate input is not an error.
    pub fn volatility_ticks(&self, tick_size: f64) -> f64 {
        if self.prices.len() < VOL_MIN_SAMPLES {
            return 0.0;
        }
        let window: Vec<f64> = self
            .prices
            .iter()
            .rev()
            .take(VOL_SAMPLE)
            .rev()
            .copied()
            .collect();
        if window.len() < 2 {
            return 0.0;
        }
        let diffs: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let variance = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / diffs.len() as f64;
        variance.sqrt() / tick_size
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_requires_strict_monotonic_tail() {
        let mut w = RollingPriceWindow::new();
        for p in [1.0, 2.0, 3.0, 4.0] {
            w.push(p);
        }
        assert!(w.persistence_ok(Side::Long, 3));
        assert!(!w.persistence_ok(Side::Short, 3));
    }

    #[test]
    fn persistence_fails_short_window() {
        let mut w = RollingPriceWindow::new();
        w.push(1.0);
        w.push(2.0);
        assert!(!w.persistence_ok(Side::Long, 3));
    }

    #[test]
    fn persistence_n_le_1_auto_passes() {
        let w = RollingPriceWindow::new();
        assert!(w.persistence_ok(Side::Long, 1));
        assert!(w.persistence_ok(Side::Short, 0));
    }

    #[test]
    fn volatility_zero_below_min_samples() {
        let mut w = RollingPriceWindow::new();
        for p in 0..11 {
            w.push(p as f64);
        }
        assert_eq!(w.volatility_ticks(0.01), 0.0);
    }

    #[test]
    fn volatility_nonzero_once_enough_samples() {
        let mut w = RollingPriceWindow::new();
        for i in 0..20 {
            w.push(if i % 2 == 0 { 100.0 } else { 100.05 });
        }
        assert!(w.volatility_ticks(0.01) > 0.0);
    }

    #[test]
    fn window_caps_at_60() {
        let mut w = RollingPriceWindow::new();
        for i in 0..100 {
            w.push(i as f64);
        }
        assert_eq!(w.len(), 60);
    }
}
