//! # mdcast-core
//!
//! Core crate for the mdcast quote distribution demo, providing:
//!
//! - **Types** (`types`) — the 64-byte quote record and fixed-width symbol utils
//! - **Ring** (`ring`) — lock-free SPSC ring of quote records for shared memory
//! - **Shared memory** (`shm`) — named POSIX segment lifecycle (create/attach/unlink)
//! - **TCP** (`tcp`) — broadcast server fanning JSON lines out to all clients
//! - **Clock** (`clock`) — cached wall-clock timestamp with a background refresher
//! - **Time utilities** (`time_util`) — direct high-precision timestamps
//! - **Latency** (`latency`) — histogram-based latency statistics
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `MdcastError` via thiserror
//! - **Logging** (`logging`) — tracing-based structured logging
//! - **CPU affinity** (`cpu_affinity`) — thread-to-core pinning for hot loops
//!
//! One publisher process stamps each quote with the cached clock, offers it to
//! the shared-memory ring, and broadcasts the same record as a JSON line to
//! every connected TCP client. Consumers on either path subtract the embedded
//! timestamp from their own clock reading to report end-to-end latency.

#[cfg(not(unix))]
compile_error!("mdcast only supports Unix-like operating systems.");

pub mod clock;
pub mod config;
pub mod cpu_affinity;
pub mod error;
pub mod latency;
pub mod logging;
pub mod ring;
pub mod shm;
pub mod tcp;
pub mod time_util;
pub mod types;

// Re-export the record types at crate root for convenience.
pub use types::*;
