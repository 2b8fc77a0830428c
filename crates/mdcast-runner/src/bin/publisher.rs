//! Process A: the market data publisher.
//!
//! Creates the shared-memory segment hosting the quote ring, starts the TCP
//! broadcast server, then runs the generation loop on a blocking worker:
//! stamp a synthetic quote with the cached clock, offer it to the ring
//! (overflow drops are counted, not retried), and broadcast the same record
//! as a JSON line to every connected client.
//!
//! # Usage
//!
//! ```bash
//! publisher [config.json] [--port 9000] [--count 100000] [--shm-name hft_market_data]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use mdcast_core::clock::CachedClock;
use mdcast_core::config::{self, AppConfig};
use mdcast_core::cpu_affinity;
use mdcast_core::ring::QuoteRing;
use mdcast_core::shm::ShmSegment;
use mdcast_core::tcp::BroadcastServer;
use mdcast_runner::quotegen::QuoteGenerator;

/// mdcast market data publisher.
#[derive(Parser)]
#[command(name = "publisher", about = "mdcast market data publisher")]
struct Cli {
    /// Configuration file path (JSON). All settings have defaults.
    config: Option<PathBuf>,

    /// TCP broadcast port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Number of quotes to publish, 0 for unlimited (overrides config).
    #[arg(long)]
    count: Option<u64>,

    /// Shared-memory object name (overrides config).
    #[arg(long)]
    shm_name: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

struct RingAddr(*mut u8);
// SAFETY: the pointer targets the segment mapping owned by main, which
// outlives the producer task (joined before the segment drops).
unsafe impl Send for RingAddr {}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir());
    mdcast_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), "publisher");

    let shm_name = cli.shm_name.unwrap_or_else(|| config.effective_shm_name());
    let port = cli.port.unwrap_or_else(|| config.effective_tcp_port());
    let count = cli.count.unwrap_or_else(|| config.effective_message_count());
    let pace = Duration::from_micros(config.effective_pace_us());
    let stats_every = config.effective_stats_every();
    let symbols = config.effective_symbols();
    let publisher_core = config.publisher_core();

    let segment = ShmSegment::create(&shm_name, QuoteRing::shm_size())?;
    info!(
        "created segment {} ({} bytes, ring capacity {})",
        segment.name(),
        segment.size(),
        QuoteRing::capacity()
    );

    let server = BroadcastServer::start(port).await?;
    let clock = Arc::new(CachedClock::new());
    let stop = Arc::new(AtomicBool::new(false));

    let ring_addr = RingAddr(segment.addr());
    let mut producer = tokio::task::spawn_blocking({
        let clock = Arc::clone(&clock);
        let stop = Arc::clone(&stop);
        let broadcast = server.handle();
        move || {
            let ring_addr = ring_addr;
            cpu_affinity::maybe_bind(publisher_core);
            // SAFETY: the segment above is zero-filled, ring-sized, and stays
            // mapped until this task is joined; this thread is the only
            // producer anywhere.
            let ring = unsafe { QuoteRing::from_raw(ring_addr.0) };
            let mut generator = QuoteGenerator::new(&symbols);
            let mut sent: u64 = 0;
            let mut dropped: u64 = 0;

            while !stop.load(Ordering::Relaxed) {
                if count != 0 && sent >= count {
                    break;
                }
                let quote = generator.next_quote(clock.now());
                if !ring.try_push(&quote) {
                    // No consumer attached or it fell behind; drop, don't block.
                    dropped += 1;
                }
                broadcast.broadcast(&quote.to_json());
                sent += 1;

                if sent % stats_every == 0 {
                    info!(
                        "published {sent} quotes ({dropped} ring drops, {} tcp clients)",
                        broadcast.client_count()
                    );
                }
                if !pace.is_zero() {
                    std::thread::sleep(pace);
                }
            }
            (sent, dropped)
        }
    });

    let (sent, dropped) = tokio::select! {
        res = &mut producer => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            stop.store(true, Ordering::Relaxed);
            producer.await?
        }
    };

    info!("publisher done — {sent} quotes published, {dropped} dropped on ring overflow");
    server.shutdown().await;
    Ok(())
}
