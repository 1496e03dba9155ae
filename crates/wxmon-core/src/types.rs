//! Typed form of the remote weather API payload

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::{parse_timestamp, utc_from_epoch, ParsedTime, TimeParseError};
use crate::units::{fahrenheit_to_celsius, inches_to_mm, inhg_to_hpa, mph_to_kmh};

/// Unix timestamp identifying one remote reading
pub type Epoch = i64;

/// Payload decoding error for a single observation record
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Malformed observation record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Epoch out of range: {0}")]
    EpochOutOfRange(Epoch),

    #[error(transparent)]
    Time(#[from] TimeParseError),
}

/// Response envelope returned by the remote API
///
/// Records stay untyped here so one bad record can be rejected without
/// losing the rest of the batch; see [`RawObservation::from_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObservationEnvelope {
    pub observations: Vec<Value>,
}

/// One observation record as sent by the remote API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    #[serde(rename = "stationID")]
    pub station_id: String,
    pub lat: f64,
    pub lon: f64,
    pub tz: String,
    pub epoch: Epoch,
    pub obs_time_local: String,

    #[serde(default)]
    pub winddir_avg: Option<f64>,
    #[serde(default)]
    pub humidity_high: Option<f64>,
    #[serde(default)]
    pub humidity_low: Option<f64>,
    #[serde(default)]
    pub humidity_avg: Option<f64>,
    #[serde(default)]
    pub solar_radiation_high: Option<f64>,
    #[serde(default)]
    pub uv_high: Option<f64>,
    #[serde(default)]
    pub qc_status: Option<i64>,

    #[serde(default)]
    pub imperial: ImperialReadings,
}

/// The `imperial` sub-object: °F, mph, inHg and inches
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImperialReadings {
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub temp_avg: Option<f64>,
    pub windspeed_high: Option<f64>,
    pub windspeed_low: Option<f64>,
    pub windspeed_avg: Option<f64>,
    pub windgust_high: Option<f64>,
    pub windgust_low: Option<f64>,
    pub windgust_avg: Option<f64>,
    pub dewpt_high: Option<f64>,
    pub dewpt_low: Option<f64>,
    pub dewpt_avg: Option<f64>,
    pub windchill_high: Option<f64>,
    pub windchill_low: Option<f64>,
    pub windchill_avg: Option<f64>,
    pub heatindex_high: Option<f64>,
    pub heatindex_low: Option<f64>,
    pub heatindex_avg: Option<f64>,
    pub pressure_max: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_trend: Option<f64>,
    pub precip_rate: Option<f64>,
    pub precip_total: Option<f64>,
}

/// Metric readings as stored: °C, km/h, hPa and mm, one decimal
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricReadings {
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub temp_avg: Option<f64>,
    pub windspeed_high: Option<f64>,
    pub windspeed_low: Option<f64>,
    pub windspeed_avg: Option<f64>,
    pub windgust_high: Option<f64>,
    pub windgust_low: Option<f64>,
    pub windgust_avg: Option<f64>,
    pub dewpt_high: Option<f64>,
    pub dewpt_low: Option<f64>,
    pub dewpt_avg: Option<f64>,
    pub windchill_high: Option<f64>,
    pub windchill_low: Option<f64>,
    pub windchill_avg: Option<f64>,
    pub heatindex_high: Option<f64>,
    pub heatindex_low: Option<f64>,
    pub heatindex_avg: Option<f64>,
    pub pressure_max: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_trend: Option<f64>,
    pub precip_rate: Option<f64>,
    pub precip_total: Option<f64>,
}

impl ImperialReadings {
    pub fn to_metric(&self) -> MetricReadings {
        MetricReadings {
            temp_high: fahrenheit_to_celsius(self.temp_high),
            temp_low: fahrenheit_to_celsius(self.temp_low),
            temp_avg: fahrenheit_to_celsius(self.temp_avg),
            windspeed_high: mph_to_kmh(self.windspeed_high),
            windspeed_low: mph_to_kmh(self.windspeed_low),
            windspeed_avg: mph_to_kmh(self.windspeed_avg),
            windgust_high: mph_to_kmh(self.windgust_high),
            windgust_low: mph_to_kmh(self.windgust_low),
            windgust_avg: mph_to_kmh(self.windgust_avg),
            dewpt_high: fahrenheit_to_celsius(self.dewpt_high),
            dewpt_low: fahrenheit_to_celsius(self.dewpt_low),
            dewpt_avg: fahrenheit_to_celsius(self.dewpt_avg),
            windchill_high: fahrenheit_to_celsius(self.windchill_high),
            windchill_low: fahrenheit_to_celsius(self.windchill_low),
            windchill_avg: fahrenheit_to_celsius(self.windchill_avg),
            heatindex_high: fahrenheit_to_celsius(self.heatindex_high),
            heatindex_low: fahrenheit_to_celsius(self.heatindex_low),
            heatindex_avg: fahrenheit_to_celsius(self.heatindex_avg),
            pressure_max: inhg_to_hpa(self.pressure_max),
            pressure_min: inhg_to_hpa(self.pressure_min),
            pressure_trend: inhg_to_hpa(self.pressure_trend),
            precip_rate: inches_to_mm(self.precip_rate),
            precip_total: inches_to_mm(self.precip_total),
        }
    }
}

/// Quality-control code attached to each observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum QcStatus {
    Unverified,
    Validated,
    Error(i64),
}

impl QcStatus {
    pub const UNVERIFIED_CODE: i64 = -1;
    pub const VALIDATED_CODE: i64 = 1;

    pub fn code(self) -> i64 {
        match self {
            QcStatus::Unverified => Self::UNVERIFIED_CODE,
            QcStatus::Validated => Self::VALIDATED_CODE,
            QcStatus::Error(code) => code,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, QcStatus::Error(_))
    }
}

impl Default for QcStatus {
    fn default() -> Self {
        QcStatus::Unverified
    }
}

impl From<i64> for QcStatus {
    fn from(code: i64) -> Self {
        match code {
            Self::UNVERIFIED_CODE => QcStatus::Unverified,
            Self::VALIDATED_CODE => QcStatus::Validated,
            other => QcStatus::Error(other),
        }
    }
}

impl From<QcStatus> for i64 {
    fn from(status: QcStatus) -> Self {
        status.code()
    }
}

/// Fully converted observation, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub station_id: String,
    pub epoch: Epoch,
    pub obs_time_local: ParsedTime,
    pub winddir_avg: Option<f64>,
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub solar_radiation_high: Option<f64>,
    pub uv_high: Option<f64>,
    pub qc_status: QcStatus,
    pub metric: MetricReadings,
}

impl RawObservation {
    /// Decode a single record from the envelope
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn qc(&self) -> QcStatus {
        self.qc_status.map(QcStatus::from).unwrap_or_default()
    }

    /// Convert units and parse timestamps
    pub fn normalize(&self) -> Result<NewObservation, PayloadError> {
        if utc_from_epoch(self.epoch).is_none() {
            return Err(PayloadError::EpochOutOfRange(self.epoch));
        }
        let obs_time_local = parse_timestamp(&self.obs_time_local)?;

        Ok(NewObservation {
            station_id: self.station_id.clone(),
            epoch: self.epoch,
            obs_time_local,
            winddir_avg: self.winddir_avg,
            humidity_high: self.humidity_high,
            humidity_low: self.humidity_low,
            humidity_avg: self.humidity_avg,
            solar_radiation_high: self.solar_radiation_high,
            uv_high: self.uv_high,
            qc_status: self.qc(),
            metric: self.imperial.to_metric(),
        })
    }
}
