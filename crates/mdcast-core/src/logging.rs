//! Logging bootstrap for the three mdcast processes.
//!
//! Console output by default; pass a directory to also write daily-rotating
//! files named after the process. The `RUST_LOG` env var wins over the
//! configured level, so a consumer can be turned up to `debug` without
//! touching the publisher's config.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Call once, first thing in `main`.
///
/// `process` names the rotating log file (e.g. `"publisher"`); it is unused
/// when `log_dir` is `None`.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, process: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, process))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(file_layer)
        .init();
}
