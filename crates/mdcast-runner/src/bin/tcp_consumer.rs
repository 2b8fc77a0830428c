//! Process C: the TCP consumer.
//!
//! Connects to the publisher's broadcast port and reads newline-delimited
//! JSON quotes, recording end-to-end latency as (local cached-clock read)
//! minus (the quote's embedded timestamp). An undecodable line is counted
//! and skipped; the stream continues. EOF (publisher gone) ends the loop
//! cleanly, other transport errors surface as process failures.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use mdcast_core::clock::CachedClock;
use mdcast_core::config::{self, AppConfig};
use mdcast_core::latency::LatencyCollector;
use mdcast_core::types::Quote;

/// mdcast TCP consumer.
#[derive(Parser)]
#[command(name = "tcp-consumer", about = "mdcast TCP consumer")]
struct Cli {
    /// Configuration file path (JSON). All settings have defaults.
    config: Option<PathBuf>,

    /// Publisher port to connect to (overrides config).
    #[arg(long)]
    port: Option<u16>,

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

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir());
    mdcast_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), "tcp-consumer");

    let port = cli.port.unwrap_or_else(|| config.effective_tcp_port());
    let count = cli.count.unwrap_or_else(|| config.effective_message_count());
    let stats_every = config.effective_stats_every();

    let addr = format!("127.0.0.1:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connect to {addr} failed — is the publisher running?"))?;
    stream.set_nodelay(true)?;
    info!("connected to publisher at {addr}");

    let clock = CachedClock::new();
    let mut lines = BufReader::new(stream).lines();
    let mut latency = LatencyCollector::new();
    let mut received: u64 = 0;
    let mut parse_errors: u64 = 0;

    // next_line errors (connection reset mid-stream) propagate out; a clean
    // EOF just ends the loop.
    while let Some(line) = lines.next_line().await? {
        match Quote::from_json(&line) {
            Some(quote) => {
                received += 1;
                latency.record_ns(clock.now() - quote.timestamp_ns);

                if received % stats_every == 0
                    && let Some(stats) = latency.stats()
                {
                    info!(
                        "{received} quotes via tcp ({parse_errors} parse errors) — latency {stats}"
                    );
                }
                if count != 0 && received >= count {
                    break;
                }
            }
            None => {
                parse_errors += 1;
                warn!("undecodable line: {line}");
            }
        }
    }

    if let Some(stats) = latency.stats() {
        info!("final tcp latency over {received} quotes ({parse_errors} parse errors) — {stats}");
    } else {
        info!("stream ended before any quote arrived");
    }
    Ok(())
}
