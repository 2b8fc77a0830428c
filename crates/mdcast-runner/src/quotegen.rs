//! Synthetic quote generation.
//!
//! A small instrument table with per-symbol random-walk mids. Each call picks
//! a random instrument, nudges its mid price, and wraps it in a [`Quote`]
//! with a caller-supplied timestamp. Prices stay positive and spreads stay a
//! few basis points wide so the output looks like a plausible quote stream.

use mdcast_core::types::Quote;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Built-in instrument table used when the config names no symbols.
const DEFAULT_INSTRUMENTS: &[(&str, f64)] = &[
    ("AAPL", 190.0),
    ("MSFT", 420.0),
    ("GOOG", 175.0),
    ("AMZN", 185.0),
    ("TSLA", 250.0),
    ("NVDA", 125.0),
    ("META", 500.0),
    ("RELIANCE", 2850.0),
];

/// Fallback base price for symbols supplied by config.
const DEFAULT_BASE_PRICE: f64 = 100.0;

struct InstrumentState {
    symbol: String,
    mid: f64,
}

/// Random-walk quote source over a fixed instrument table.
pub struct QuoteGenerator {
    instruments: Vec<InstrumentState>,
    rng: StdRng,
}

impl QuoteGenerator {
    /// Build a generator for `symbols`, or for the built-in table when the
    /// slice is empty.
    pub fn new(symbols: &[String]) -> Self {
        let instruments = if symbols.is_empty() {
            DEFAULT_INSTRUMENTS
                .iter()
                .map(|&(sym, base)| InstrumentState { symbol: sym.to_string(), mid: base })
                .collect()
        } else {
            symbols
                .iter()
                .map(|sym| InstrumentState { symbol: sym.clone(), mid: DEFAULT_BASE_PRICE })
                .collect()
        };
        Self { instruments, rng: StdRng::from_entropy() }
    }

    /// Number of instruments in the table.
    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    /// Produce the next quote, stamped with `timestamp_ns`.
    pub fn next_quote(&mut self, timestamp_ns: i64) -> Quote {
        let idx = self.rng.gen_range(0..self.instruments.len());
        let inst = &mut self.instruments[idx];

        // Random walk of up to ±10 bps, floored so the mid never goes
        // non-positive on pathological config prices.
        let step = inst.mid * self.rng.gen_range(-0.001..0.001);
        inst.mid = (inst.mid + step).max(0.01);

        // Spread of 1–5 bps around the mid.
        let half_spread = inst.mid * self.rng.gen_range(0.00005..0.00025);
        Quote::new(&inst.symbol, inst.mid - half_spread, inst.mid + half_spread, timestamp_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_builtin_table_when_no_symbols_given() {
        let generator = QuoteGenerator::new(&[]);
        assert_eq!(generator.instrument_count(), DEFAULT_INSTRUMENTS.len());
    }

    #[test]
    fn quotes_carry_the_given_timestamp_and_a_positive_spread() {
        let mut generator = QuoteGenerator::new(&["AAPL".to_string()]);
        for ts in 0..1000 {
            let q = generator.next_quote(ts);
            assert_eq!(q.timestamp_ns, ts);
            assert_eq!(q.instrument(), "AAPL");
            assert!(q.bid > 0.0);
            assert!(q.ask > q.bid, "ask {} should exceed bid {}", q.ask, q.bid);
        }
    }

    #[test]
    fn walk_stays_near_the_base_price() {
        let mut generator = QuoteGenerator::new(&["X".to_string()]);
        let mut last_mid = DEFAULT_BASE_PRICE;
        for ts in 0..10_000 {
            let q = generator.next_quote(ts);
            let mid = (q.bid + q.ask) / 2.0;
            // ±10 bps per step keeps consecutive mids close.
            assert!((mid - last_mid).abs() <= last_mid * 0.002);
            last_mid = mid;
        }
    }
}
