//! Polling monitor for wxmon
//!
//! [`MonitorScheduler`] owns the repeating fetch-and-store loop; at most one
//! loop is active per scheduler. [`StatsQuery`] is the read-only side used by
//! the daemon's reporting commands.

pub mod scheduler;
pub mod stats;

pub use scheduler::*;
pub use stats::*;

use thiserror::Error;
use wxmon_config::ConfigError;
use wxmon_db::{BatchReport, DbError};
use wxmon_fetch::FetchError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{} of {} observations failed to store", .0.store_failures, .0.total())]
    Store(BatchReport),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid monitor settings: {0}")]
    Config(#[from] ConfigError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
