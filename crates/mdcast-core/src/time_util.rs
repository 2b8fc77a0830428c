//! High-precision time utilities.
//!
//! Provides the direct (syscall-per-read) nanosecond timestamp used to seed
//! and refresh the cached clock, via `clock_gettime(CLOCK_REALTIME)` on Linux
//! with a `SystemTime` fallback elsewhere. Hot paths should read
//! [`crate::clock::CachedClock`] instead.

#[cfg(not(target_os = "linux"))]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(target_os = "linux")]
#[inline]
fn clock_realtime() -> (i64, i64) {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: CLOCK_REALTIME is always valid. Failure returns -1 but the
    // zeroed ts is a safe fallback (epoch).
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
    }
    (ts.tv_sec as i64, ts.tv_nsec as i64)
}

#[cfg(not(target_os = "linux"))]
#[inline]
fn clock_realtime() -> (i64, i64) {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (d.as_secs() as i64, d.subsec_nanos() as i64)
}

/// Current time as **nanoseconds** since Unix epoch.
///
/// Signed to match the `timestamp_ns` field of a quote record, so latency is
/// a plain subtraction.
#[inline]
pub fn now_ns() -> i64 {
    let (sec, nsec) = clock_realtime();
    sec * 1_000_000_000 + nsec
}
