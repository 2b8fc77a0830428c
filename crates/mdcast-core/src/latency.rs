//! Latency accounting for the consumer paths.
//!
//! Each consumer records, per quote, its own clock reading minus the
//! timestamp the publisher embedded. Samples land in a fixed histogram of
//! 10 µs bins spanning 0–30 ms; anything slower falls into the last bin for
//! percentile purposes while min/max/avg stay exact. Stats are computed on
//! demand and printed on a throttle, never on the per-quote path.

/// Histogram bin width in microseconds.
const BIN_WIDTH_US: u64 = 10;

/// Bin count: covers 0–30 ms.
const BIN_COUNT: usize = 3000;

/// Snapshot of the collected distribution.
#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: f64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min={}µs max={}µs avg={:.1}µs p50={}µs p90={}µs p99={}µs",
            self.min_us, self.max_us, self.avg_us, self.p50_us, self.p90_us, self.p99_us,
        )
    }
}

/// Histogram-backed latency collector. One per consumer loop; not shared.
pub struct LatencyCollector {
    histogram: Vec<u64>,
    count: u64,
    sum_us: u64,
    min_us: u64,
    max_us: u64,
}

impl LatencyCollector {
    pub fn new() -> Self {
        Self { histogram: vec![0; BIN_COUNT], count: 0, sum_us: 0, min_us: u64::MAX, max_us: 0 }
    }

    /// Record one end-to-end sample in nanoseconds.
    ///
    /// Negative inputs clamp to zero: the cached clock refreshes every
    /// 200 ms, so a consumer reading taken just before a refresh can trail
    /// the producer's stamp.
    #[inline]
    pub fn record_ns(&mut self, latency_ns: i64) {
        self.record_us(latency_ns.max(0) as u64 / 1_000);
    }

    /// Record one sample in microseconds.
    #[inline]
    pub fn record_us(&mut self, latency_us: u64) {
        self.count += 1;
        self.sum_us += latency_us;
        self.min_us = self.min_us.min(latency_us);
        self.max_us = self.max_us.max(latency_us);
        let bin = ((latency_us / BIN_WIDTH_US) as usize).min(BIN_COUNT - 1);
        self.histogram[bin] += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summarize everything recorded so far. `None` before the first sample.
    pub fn stats(&self) -> Option<LatencyStats> {
        if self.count == 0 {
            return None;
        }
        let mut percentiles = self.percentiles([0.50, 0.90, 0.99]);
        let p99_us = percentiles.pop().unwrap_or(self.max_us);
        let p90_us = percentiles.pop().unwrap_or(self.max_us);
        let p50_us = percentiles.pop().unwrap_or(self.max_us);
        Some(LatencyStats {
            count: self.count,
            min_us: self.min_us,
            max_us: self.max_us,
            avg_us: self.sum_us as f64 / self.count as f64,
            p50_us,
            p90_us,
            p99_us,
        })
    }

    /// Drop all samples and start over.
    pub fn reset(&mut self) {
        self.histogram.fill(0);
        self.count = 0;
        self.sum_us = 0;
        self.min_us = u64::MAX;
        self.max_us = 0;
    }

    /// One cumulative walk of the histogram resolving several percentiles.
    ///
    /// `fractions` must be ascending. The last bin absorbs everything past
    /// the histogram range, so every requested fraction resolves.
    fn percentiles<const N: usize>(&self, fractions: [f64; N]) -> Vec<u64> {
        let mut out = Vec::with_capacity(N);
        let mut cumulative = 0u64;
        let mut next = 0;
        for (bin, &n) in self.histogram.iter().enumerate() {
            cumulative += n;
            while next < N && cumulative >= (self.count as f64 * fractions[next]).ceil() as u64 {
                out.push(bin as u64 * BIN_WIDTH_US);
                next += 1;
            }
            if next == N {
                break;
            }
        }
        out
    }
}

impl Default for LatencyCollector {
    fn default() -> Self {
        Self::new()
    }
}
