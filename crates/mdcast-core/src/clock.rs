//! Cached wall-clock timestamps for hot paths.
//!
//! Reading the wall clock through a syscall on every quote is too expensive
//! for the producer's generation loop. [`CachedClock`] keeps the most recent
//! nanosecond reading in an atomic, refreshed every 200 ms by a background
//! thread; [`CachedClock::now`] is a relaxed atomic load and never enters the
//! kernel.
//!
//! The trade-off is precision: between refreshes `now()` returns the same
//! value, and the reading can lag true wall time by up to one refresh
//! interval. Latency figures computed from this clock are meaningful to
//! tens-of-milliseconds precision; callers that need tighter numbers should
//! take direct [`crate::time_util::now_ns`] readings at both ends instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::time_util;

/// How often the background refresher re-reads the real clock.
const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

struct ClockState {
    /// Latest nanoseconds-since-epoch reading.
    cached_ns: AtomicI64,
    /// Cleared to stop the refresher.
    running: AtomicBool,
}

/// A wall-clock source whose read path is a single atomic load.
///
/// Construction takes one direct reading and starts the refresher thread;
/// dropping the clock stops and joins it.
pub struct CachedClock {
    state: Arc<ClockState>,
    refresher: Option<JoinHandle<()>>,
}

impl CachedClock {
    pub fn new() -> Self {
        let state = Arc::new(ClockState {
            cached_ns: AtomicI64::new(time_util::now_ns()),
            running: AtomicBool::new(true),
        });

        let worker_state = Arc::clone(&state);
        let refresher = std::thread::spawn(move || {
            while worker_state.running.load(Ordering::Relaxed) {
                worker_state.cached_ns.store(time_util::now_ns(), Ordering::Relaxed);
                std::thread::sleep(REFRESH_INTERVAL);
            }
        });

        Self { state, refresher: Some(refresher) }
    }

    /// Latest cached reading, nanoseconds since Unix epoch. No syscall.
    ///
    /// Successive calls are non-decreasing up to the refresh precision; the
    /// same value repeats between refreshes.
    #[inline]
    pub fn now(&self) -> i64 {
        self.state.cached_ns.load(Ordering::Relaxed)
    }

    /// Whether the background refresher is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    /// The fixed refresh period of the background worker.
    pub const fn refresh_interval() -> Duration {
        REFRESH_INTERVAL
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CachedClock {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.refresher.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn successive_reads_are_non_decreasing() {
        let clock = CachedClock::new();
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
        assert!(t1 > 0, "initial reading should be a real timestamp");
    }

    #[test]
    fn tracks_wall_time_within_a_refresh_interval() {
        let clock = CachedClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(500));
        let t2 = clock.now();
        let delta = t2 - t1;
        // 500 ms of sleep, observed through a 200 ms refresh: the delta can
        // be short or long by up to one interval, plus scheduler slop.
        assert!(delta >= 250_000_000, "delta {delta} ns too small");
        assert!(delta <= 900_000_000, "delta {delta} ns too large");
    }

    #[test]
    fn reads_are_syscall_free_cheap() {
        let clock = CachedClock::new();
        let start = Instant::now();
        let mut acc = 0i64;
        for _ in 0..1_000_000 {
            acc = acc.wrapping_add(clock.now());
        }
        let elapsed = start.elapsed();
        // A million syscalls would take on the order of a second; a million
        // relaxed loads finish orders of magnitude faster even unoptimized.
        assert!(elapsed < Duration::from_millis(250), "1M reads took {elapsed:?}");
        assert_ne!(acc, 0);
    }

    #[test]
    fn refresh_interval_is_queryable() {
        assert_eq!(CachedClock::refresh_interval(), Duration::from_millis(200));
    }

    #[test]
    fn drop_stops_the_refresher() {
        let clock = CachedClock::new();
        assert!(clock.is_running());
        drop(clock);
        // Nothing to assert beyond "drop returned" — it joins the thread.
    }
}
