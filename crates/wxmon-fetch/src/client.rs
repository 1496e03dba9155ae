//! HTTP client for the remote observation API

use crate::{FetchError, FetchResult, ObservationSource};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use wxmon_config::MonitorSettings;
use wxmon_core::ObservationEnvelope;

/// Upper bound for one request, connect to last byte
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `units` code the remote API uses for imperial readings
pub const IMPERIAL_UNITS: &str = "e";

pub struct FetchClient {
    client: Client,
    api_url: Url,
    api_key: String,
    station_id: Option<String>,
}

impl FetchClient {
    pub fn new(api_url: &str, api_key: &str, station_id: Option<String>) -> FetchResult<Self> {
        Self::with_timeout(api_url, api_key, station_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_url: &str,
        api_key: &str,
        station_id: Option<String>,
        timeout: Duration,
    ) -> FetchResult<Self> {
        if api_key.trim().is_empty() {
            return Err(FetchError::Config("empty api key".to_string()));
        }
        let api_url = Url::parse(api_url)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url,
            api_key: api_key.to_string(),
            station_id,
        })
    }

    pub fn from_settings(settings: &MonitorSettings) -> FetchResult<Self> {
        settings
            .validate()
            .map_err(|e| FetchError::Config(e.to_string()))?;
        Self::new(
            &settings.api_url,
            &settings.api_key,
            settings.station_id.clone(),
        )
    }

    /// Full request URL including the fixed query parameters
    pub fn request_url(&self) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("format", "json")
                .append_pair("units", IMPERIAL_UNITS)
                .append_pair("apiKey", &self.api_key);
            if let Some(station_id) = &self.station_id {
                query.append_pair("stationId", station_id);
            }
        }
        url
    }

    pub fn station_id(&self) -> Option<&str> {
        self.station_id.as_deref()
    }

    /// Fetch the current envelope
    ///
    /// A 204 means the station has nothing new and yields an empty
    /// envelope. Records are not validated here; the store rejects bad
    /// ones individually.
    #[instrument(skip(self), fields(api_url = %self.api_url, station_id = ?self.station_id))]
    pub async fn fetch_observations(&self) -> FetchResult<ObservationEnvelope> {
        let response = self.client.get(self.request_url()).send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("No content from remote API");
            return Ok(ObservationEnvelope::default());
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let envelope = response
            .json::<ObservationEnvelope>()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    FetchError::InvalidBody(e.without_url().to_string())
                } else {
                    FetchError::from(e)
                }
            })?;

        debug!("Fetched {} observation records", envelope.observations.len());
        Ok(envelope)
    }
}

#[async_trait::async_trait]
impl ObservationSource for FetchClient {
    fn name(&self) -> &str {
        "weather-api"
    }

    async fn fetch(&self) -> FetchResult<ObservationEnvelope> {
        self.fetch_observations().await
    }
}
