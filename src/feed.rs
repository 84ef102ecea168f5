// =============================================================================
// SineWalkQuoteFeed — deterministic-ish fake quotes for wiring/testing
// =============================================================================
//
// A smooth drift plus wiggle, one tick wide around a rounded last price.
// Not a realistic market model, just enough motion to exercise every gate.
// =============================================================================

use crate::driver::QuoteSource;
use crate::types::Quote;

pub struct SineWalkQuoteFeed {
    tick_size: f64,
    t0: f64,
}

impl SineWalkQuoteFeed {
    pub fn new(tick_size: f64, t0: f64) -> Self {
        Self { tick_size, t0 }
    }
}

impl QuoteSource for SineWalkQuoteFeed {
    fn next_quote(&mut self, now: f64) -> Option<Quote> {
        let t = now - self.t0;
        let last = 75.0 + 0.25 * (t / 7.0).sin() + 0.10 * (t / 1.5).sin();
        let last = round2(last);
        let bid = round2(last - self.tick_size);
        let ask = round2(last + self.tick_size);
        Some(Quote::new(now, last, bid, ask, self.tick_size))
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_a_quote_with_last_between_bid_and_ask() {
        let mut feed = SineWalkQuoteFeed::new(0.01, 0.0);
        let q = feed.next_quote(10.0).unwrap();
        assert!(q.bid <= q.last && q.last <= q.ask);
    }
}
