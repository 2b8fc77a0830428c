//! Record types flowing through both transport paths.

pub mod quote;
pub mod symbol;

pub use quote::{INSTRUMENT_LEN, Quote};
pub use symbol::{instrument_from_bytes, instrument_to_bytes};
