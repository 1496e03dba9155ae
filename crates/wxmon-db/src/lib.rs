//! Observation store for wxmon
//!
//! SQLite-backed persistence for stations and observations. The store owns
//! the dedup rule: one row per (station, epoch), enforced by a unique
//! constraint and checked inside the same transaction as the insert.

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use queries::*;
pub use schema::*;

use thiserror::Error;
use wxmon_core::PayloadError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this error should be logged as a fault
    ///
    /// Lookups of unknown stations are ordinary query results.
    pub fn is_fault(&self) -> bool {
        !matches!(self, DbError::NotFound(_))
    }
}

impl From<PayloadError> for DbError {
    fn from(err: PayloadError) -> Self {
        DbError::Conversion(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
