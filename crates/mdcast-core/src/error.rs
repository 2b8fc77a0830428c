//! Typed error definitions for mdcast.
//!
//! Provides [`MdcastError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result` in the binaries.
//!
//! Per-message conditions are deliberately *not* errors: a full ring, an empty
//! ring, and an undecodable JSON line are reported in-band (`bool` / `Option`)
//! so the hot paths never allocate an error for routine outcomes.

use thiserror::Error;

/// Domain-specific errors for mdcast.
#[derive(Debug, Error)]
pub enum MdcastError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Shared memory creation, attach, sizing, or mapping error.
    #[error("shm error: {0}")]
    Shm(String),

    /// TCP listener or socket error.
    #[error("net error: {0}")]
    Net(String),
}
