//! Process B: the shared-memory consumer.
//!
//! Attaches to the publisher's segment and spin-reads the quote ring on a
//! single thread, recording end-to-end latency as (local cached-clock read)
//! minus (the quote's embedded timestamp). After a run of consecutive empty
//! polls the loop backs off with a 1 µs sleep so an idle consumer does not
//! burn a whole core.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use mdcast_core::clock::CachedClock;
use mdcast_core::config::{self, AppConfig};
use mdcast_core::cpu_affinity;
use mdcast_core::latency::LatencyCollector;
use mdcast_core::ring::QuoteRing;
use mdcast_core::shm::ShmSegment;
use mdcast_core::types::Quote;

/// Consecutive empty polls tolerated before backing off.
const EMPTY_POLLS_BEFORE_SLEEP: u32 = 1_000;

/// Backoff sleep once the ring has been empty for a while.
const IDLE_SLEEP: Duration = Duration::from_micros(1);

/// mdcast shared-memory consumer.
#[derive(Parser)]
#[command(name = "shm-consumer", about = "mdcast shared-memory consumer")]
struct Cli {
    /// Configuration file path (JSON). All settings have defaults.
    config: Option<PathBuf>,

    /// Shared-memory object name (overrides config).
    #[arg(long)]
    shm_name: Option<String>,

    /// Number of quotes to consume before exiting, 0 for unlimited
    /// (overrides config).
    #[arg(long)]
    count: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir());
    mdcast_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), "shm-consumer");

    let shm_name = cli.shm_name.unwrap_or_else(|| config.effective_shm_name());
    let count = cli.count.unwrap_or_else(|| config.effective_message_count());
    let stats_every = config.effective_stats_every();

    let segment = ShmSegment::attach(&shm_name, QuoteRing::shm_size())
        .with_context(|| format!("attach to '{shm_name}' failed — is the publisher running?"))?;
    info!("attached to {} ({} bytes)", segment.name(), segment.size());

    cpu_affinity::maybe_bind(config.shm_consumer_core());
    let clock = CachedClock::new();

    // SAFETY: the publisher created this segment ring-sized and zero-filled;
    // the mapping lives until `segment` drops at the end of main, and this
    // thread is the only consumer anywhere.
    let ring = unsafe { QuoteRing::from_raw(segment.addr()) };

    let mut latency = LatencyCollector::new();
    let mut quote = Quote::default();
    let mut received: u64 = 0;
    let mut empty_polls: u32 = 0;

    loop {
        if ring.try_pop(&mut quote) {
            empty_polls = 0;
            received += 1;
            latency.record_ns(clock.now() - quote.timestamp_ns);

            if received % stats_every == 0
                && let Some(stats) = latency.stats()
            {
                info!("{received} quotes via shm — latency {stats}");
            }
            if count != 0 && received >= count {
                break;
            }
        } else {
            empty_polls += 1;
            if empty_polls >= EMPTY_POLLS_BEFORE_SLEEP {
                std::thread::sleep(IDLE_SLEEP);
                empty_polls = 0;
            } else {
                std::hint::spin_loop();
            }
        }
    }

    if let Some(stats) = latency.stats() {
        info!("final shm latency over {received} quotes — {stats}");
    }
    Ok(())
}
