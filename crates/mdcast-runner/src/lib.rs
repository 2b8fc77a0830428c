//! # mdcast-runner
//!
//! The three mdcast processes:
//!
//! - `publisher` — generates quotes, pushes them to the shared-memory ring,
//!   and broadcasts them as JSON lines over TCP
//! - `shm-consumer` — attaches to the ring and spin-reads it, reporting
//!   end-to-end latency
//! - `tcp-consumer` — connects to the broadcast port and parses JSON lines,
//!   reporting end-to-end latency
//!
//! This library target holds the pieces the binaries share.

pub mod quotegen;
