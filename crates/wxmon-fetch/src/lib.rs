//! Remote weather API client
//!
//! This crate fetches observation envelopes from the remote station API.
//! The scheduler only sees the [`ObservationSource`] trait, so tests and
//! alternative feeds can stand in for the HTTP client.

pub mod client;

pub use client::*;

use thiserror::Error;
use wxmon_core::ObservationEnvelope;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid API url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    Transport(reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Invalid settings: {0}")]
    Config(String),
}

/// Request URLs carry the API key, so they are stripped before the error
/// can reach a log line.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.without_url())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Anything that can produce a batch of raw observations on demand
#[async_trait::async_trait]
pub trait ObservationSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Retrieve the current observation envelope
    async fn fetch(&self) -> FetchResult<ObservationEnvelope>;
}
