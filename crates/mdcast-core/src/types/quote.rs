//! The quote record — the one value exchanged by every path in the system.
//!
//! `Quote` is `#[repr(C)]`, `Copy`, exactly one cache line (64 bytes) and
//! 64-byte aligned, so it can be stored directly in the shared-memory ring and
//! byte-copied between processes without serialization. The TCP path uses the
//! JSON line codec below instead.
//!
//! # Memory layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       16    instrument  (zero-padded, zero-terminated ASCII)
//! 16      8     bid         (f64)
//! 24      8     ask         (f64)
//! 32      8     timestamp_ns (i64, nanoseconds since Unix epoch)
//! 40      24    padding     (always zero)
//! ```
//!
//! Keeping the padding deterministically zero makes two equal quotes byte-equal,
//! which the cross-process tests rely on.

use serde_json::json;

use super::symbol::{instrument_from_bytes, instrument_to_bytes};

/// Fixed width of the instrument field. 15 usable bytes plus a terminator.
pub const INSTRUMENT_LEN: usize = 16;

const PAD_LEN: usize = 24;

/// A single market quote: best bid/ask for one instrument at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct Quote {
    /// Instrument symbol, zero-padded and zero-terminated.
    pub instrument: [u8; INSTRUMENT_LEN],
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Producer timestamp, nanoseconds since Unix epoch.
    pub timestamp_ns: i64,
    /// Explicit padding out to the cache line. Always zero.
    _pad: [u8; PAD_LEN],
}

// The ring and the shared-memory layout both assume one quote per cache line.
const _: () = assert!(std::mem::size_of::<Quote>() == 64);
const _: () = assert!(std::mem::align_of::<Quote>() == 64);

impl Default for Quote {
    fn default() -> Self {
        Self {
            instrument: [0; INSTRUMENT_LEN],
            bid: 0.0,
            ask: 0.0,
            timestamp_ns: 0,
            _pad: [0; PAD_LEN],
        }
    }
}

impl Quote {
    /// Build a quote from its four semantic fields.
    ///
    /// Symbols longer than 15 bytes are truncated; the instrument field is
    /// always zero-terminated.
    pub fn new(instrument: &str, bid: f64, ask: f64, timestamp_ns: i64) -> Self {
        Self {
            instrument: instrument_to_bytes(instrument),
            bid,
            ask,
            timestamp_ns,
            _pad: [0; PAD_LEN],
        }
    }

    /// The instrument symbol as a `&str`.
    #[inline]
    pub fn instrument(&self) -> &str {
        instrument_from_bytes(&self.instrument)
    }

    /// Encode as a single compact JSON line (no trailing newline).
    ///
    /// Emits exactly the four semantic fields:
    ///
    /// ```json
    /// {"instrument":"AAPL","bid":100.25,"ask":100.5,"timestamp_ns":1700000000000000000}
    /// ```
    pub fn to_json(&self) -> String {
        json!({
            "instrument": self.instrument(),
            "bid": self.bid,
            "ask": self.ask,
            "timestamp_ns": self.timestamp_ns,
        })
        .to_string()
    }

    /// Decode a quote from a JSON object string.
    ///
    /// Accepts compact or pretty-printed JSON. Returns `None` on any parse
    /// error, on a missing field, or on a wrong-typed field (`bid` as a
    /// string, `timestamp_ns` as a float, ...). Unknown extra fields are
    /// ignored.
    pub fn from_json(s: &str) -> Option<Self> {
        let v: serde_json::Value = serde_json::from_str(s).ok()?;
        let instrument = v.get("instrument")?.as_str()?;
        let bid = v.get("bid")?.as_f64()?;
        let ask = v.get("ask")?.as_f64()?;
        let timestamp_ns = v.get("timestamp_ns")?.as_i64()?;
        Some(Self::new(instrument, bid, ask, timestamp_ns))
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Quote({} bid={:.2} ask={:.2} ts={})",
            self.instrument(),
            self.bid,
            self.ask,
            self.timestamp_ns
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_bytes(q: &Quote) -> &[u8; 64] {
        // SAFETY: Quote is repr(C), 64 bytes, with no uninitialized holes
        // (every field including padding is written by the constructors).
        unsafe { &*(q as *const Quote as *const [u8; 64]) }
    }

    #[test]
    fn layout_is_one_cache_line() {
        assert_eq!(std::mem::size_of::<Quote>(), 64);
        assert_eq!(std::mem::align_of::<Quote>(), 64);
        let q = Quote::new("AAPL", 1.0, 2.0, 3);
        assert_eq!(&q as *const Quote as usize % 64, 0);
    }

    #[test]
    fn default_is_all_zero_bytes() {
        let q = Quote::default();
        assert!(as_bytes(&q).iter().all(|&b| b == 0));
        assert_eq!(q, Quote::default());
    }

    #[test]
    fn long_symbol_truncates_and_terminates() {
        let q = Quote::new("ABCDEFGHIJKLMNOPQRST", 1.0, 1.0, 0);
        assert_eq!(q.instrument(), "ABCDEFGHIJKLMNO");
        assert_eq!(q.instrument[INSTRUMENT_LEN - 1], 0);
    }

    #[test]
    fn json_round_trip() {
        let q = Quote::new("AAPL", 100.25, 100.50, 1_700_000_000_000_000_000);
        let line = q.to_json();
        for field in ["instrument", "bid", "ask", "timestamp_ns"] {
            assert!(line.contains(field), "missing {field} in {line}");
        }
        assert!(!line.contains('\n'));
        let back = Quote::from_json(&line).expect("round trip decode");
        assert_eq!(back, q);
    }

    #[test]
    fn decode_accepts_pretty_printed() {
        let pretty = "{\n  \"instrument\": \"TSLA\",\n  \"bid\": 250.5,\n  \"ask\": 250.75,\n  \"timestamp_ns\": 42\n}";
        let q = Quote::from_json(pretty).unwrap();
        assert_eq!(q.instrument(), "TSLA");
        assert_eq!(q.bid, 250.5);
        assert_eq!(q.timestamp_ns, 42);
    }

    #[test]
    fn decode_rejects_malformed_and_incomplete() {
        assert!(Quote::from_json("not json at all").is_none());
        assert!(Quote::from_json("{\"instrument\":\"TEST\"}").is_none());
        assert!(Quote::from_json("{\"instrument\":\"T\",\"bid\":\"1.0\",\"ask\":2.0,\"timestamp_ns\":1}").is_none());
        assert!(Quote::from_json("{\"instrument\":\"T\",\"bid\":1.0,\"ask\":2.0,\"timestamp_ns\":1.5}").is_none());
        assert!(Quote::from_json("").is_none());
    }

    #[test]
    fn decode_handles_extreme_values() {
        let q = Quote::new("TEST", 999_999_999.99, 1_000_000_000.01, i64::MAX);
        let back = Quote::from_json(&q.to_json()).unwrap();
        assert_eq!(back.bid, 999_999_999.99);
        assert_eq!(back.timestamp_ns, i64::MAX);
    }
}
