//! Fixed-size instrument symbol utilities for shared-memory compatibility.
//!
//! The quote record uses `[u8; 16]` for the instrument so it can live in a
//! shared-memory ring without heap allocation and be byte-copied across
//! process boundaries. This module provides helpers to convert between `&str`
//! and the fixed-size representation.
//!
//! The last byte of the buffer is always zero: writes truncate to 15 usable
//! bytes, so a reader in another process can rely on finding a terminator.

use super::quote::INSTRUMENT_LEN;

/// Write an instrument symbol into a fixed `[u8; INSTRUMENT_LEN]` buffer.
///
/// The string is copied byte-for-byte and the remaining bytes are zero-filled.
/// Inputs longer than `INSTRUMENT_LEN - 1` bytes are silently truncated; the
/// final byte is never written, so the result is always zero-terminated.
#[inline]
pub fn instrument_to_bytes(s: &str) -> [u8; INSTRUMENT_LEN] {
    let mut buf = [0u8; INSTRUMENT_LEN];
    let len = s.len().min(INSTRUMENT_LEN - 1);
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf
}

/// Read an instrument symbol from a fixed `[u8; INSTRUMENT_LEN]` buffer.
///
/// Returns the string up to the first zero byte. Returns `""` if the buffer
/// starts with a zero byte or holds invalid UTF-8 (a foreign writer put
/// non-ASCII bytes there).
#[inline]
pub fn instrument_from_bytes(buf: &[u8; INSTRUMENT_LEN]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(INSTRUMENT_LEN);
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sym = "RELIANCE";
        let buf = instrument_to_bytes(sym);
        assert_eq!(instrument_from_bytes(&buf), sym);
    }

    #[test]
    fn empty_symbol() {
        let buf = instrument_to_bytes("");
        assert_eq!(instrument_from_bytes(&buf), "");
    }

    #[test]
    fn fifteen_bytes_fit_exactly() {
        let sym = "A".repeat(INSTRUMENT_LEN - 1);
        let buf = instrument_to_bytes(&sym);
        assert_eq!(instrument_from_bytes(&buf), sym);
        assert_eq!(buf[INSTRUMENT_LEN - 1], 0);
    }

    #[test]
    fn longer_inputs_truncate_and_stay_terminated() {
        let sym = "B".repeat(INSTRUMENT_LEN + 10);
        let buf = instrument_to_bytes(&sym);
        assert_eq!(instrument_from_bytes(&buf).len(), INSTRUMENT_LEN - 1);
        assert_eq!(buf[INSTRUMENT_LEN - 1], 0);
    }
}
