//! Configuration parsing for the mdcast processes.
//!
//! All three binaries read their settings from one optional JSON file; every
//! field has a default so the demo runs with no config at all. CLI flags in
//! the binaries override file values.
//!
//! # Example config
//!
//! ```json
//! {
//!   "shm_name": "hft_market_data",
//!   "tcp_port": 9000,
//!   "symbols": ["AAPL", "MSFT", "GOOG"],
//!   "message_count": 100000,
//!   "pace_us": 1000,
//!   "stats_every": 1000,
//!   "log": { "level": "info", "dir": "/tmp/mdcast-logs" },
//!   "cpu": { "publisher_core": 2, "shm_consumer_core": 3 }
//! }
//! ```

use serde::Deserialize;

use crate::error::MdcastError;

/// Default shared-memory object name (without the leading slash).
pub const DEFAULT_SHM_NAME: &str = "hft_market_data";

/// Default TCP broadcast port on loopback.
pub const DEFAULT_TCP_PORT: u16 = 9000;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Shared-memory object name shared by publisher and shm consumer.
    pub shm_name: Option<String>,

    /// TCP port the broadcast server listens on (loopback).
    pub tcp_port: Option<u16>,

    /// Instrument symbols the publisher generates quotes for.
    pub symbols: Option<Vec<String>>,

    /// How many quotes the publisher emits before exiting (0 = unlimited).
    pub message_count: Option<u64>,

    /// Pause between generated quotes, in microseconds.
    pub pace_us: Option<u64>,

    /// Emit a stats log line every this many messages.
    pub stats_every: Option<u64>,

    /// Logging settings.
    pub log: Option<LogConfig>,

    /// CPU pinning for the hot-loop threads.
    pub cpu: Option<CpuConfig>,
}

/// Logging block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    pub level: Option<String>,
    pub dir: Option<String>,
}

/// CPU pinning block. Negative or absent values mean "don't pin".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuConfig {
    pub publisher_core: Option<i32>,
    pub shm_consumer_core: Option<i32>,
}

impl AppConfig {
    pub fn effective_shm_name(&self) -> String {
        self.shm_name.clone().unwrap_or_else(|| DEFAULT_SHM_NAME.to_string())
    }

    pub fn effective_tcp_port(&self) -> u16 {
        self.tcp_port.unwrap_or(DEFAULT_TCP_PORT)
    }

    /// Symbols to generate. Empty means "use the built-in table".
    pub fn effective_symbols(&self) -> Vec<String> {
        self.symbols.clone().unwrap_or_default()
    }

    pub fn effective_message_count(&self) -> u64 {
        self.message_count.unwrap_or(100_000)
    }

    pub fn effective_pace_us(&self) -> u64 {
        self.pace_us.unwrap_or(1_000)
    }

    pub fn effective_stats_every(&self) -> u64 {
        self.stats_every.unwrap_or(1_000).max(1)
    }

    pub fn log_level(&self) -> Option<String> {
        self.log.as_ref().and_then(|l| l.level.clone())
    }

    pub fn log_dir(&self) -> Option<String> {
        self.log.as_ref().and_then(|l| l.dir.clone())
    }

    pub fn publisher_core(&self) -> Option<i32> {
        self.cpu.as_ref().and_then(|c| c.publisher_core)
    }

    pub fn shm_consumer_core(&self) -> Option<i32> {
        self.cpu.as_ref().and_then(|c| c.shm_consumer_core)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig, MdcastError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MdcastError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| MdcastError::Config(format!("cannot parse {}: {e}", path.display())))
}
