//! Core data types, unit conversion, and timestamp parsing for wxmon
//!
//! This crate holds the typed form of the remote weather API payload and
//! the pure functions that turn imperial readings into the metric values
//! stored by `wxmon-db`.

pub mod time;
pub mod types;
pub mod units;

pub use time::*;
pub use types::*;
pub use units::*;
