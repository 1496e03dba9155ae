//! Database schema and row types
//!
//! All measurements are stored metric. `obs_time_utc` is the epoch in
//! seconds; `obs_time_local` is the station wall clock as text, always
//! starting with `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wxmon_core::{utc_from_epoch, QcStatus};

/// Schema statements, executed in order by `DbClient::ensure_schema`
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stations (
        station_id TEXT PRIMARY KEY NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        timezone TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS observations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        station_id TEXT NOT NULL REFERENCES stations(station_id) ON DELETE CASCADE,
        epoch INTEGER NOT NULL,
        obs_time_utc INTEGER NOT NULL,
        obs_time_local TEXT NOT NULL,
        solar_radiation_high REAL,
        uv_high REAL,
        winddir_avg REAL,
        humidity_high REAL,
        humidity_low REAL,
        humidity_avg REAL,
        temp_high REAL,
        temp_low REAL,
        temp_avg REAL,
        windspeed_high REAL,
        windspeed_low REAL,
        windspeed_avg REAL,
        windgust_high REAL,
        windgust_low REAL,
        windgust_avg REAL,
        dewpt_high REAL,
        dewpt_low REAL,
        dewpt_avg REAL,
        windchill_high REAL,
        windchill_low REAL,
        windchill_avg REAL,
        heatindex_high REAL,
        heatindex_low REAL,
        heatindex_avg REAL,
        pressure_max REAL,
        pressure_min REAL,
        pressure_trend REAL,
        precip_rate REAL,
        precip_total REAL,
        qc_status INTEGER NOT NULL DEFAULT -1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (station_id, epoch)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_observations_station_time
        ON observations (station_id, obs_time_utc)
    "#,
];

/// Weather station record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct StationRow {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// Display name, `Station <id>` unless renamed
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Default display name for a station created from an observation
pub fn default_station_name(station_id: &str) -> String {
    format!("Station {}", station_id)
}

/// Observation record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ObservationRow {
    pub id: i64,
    pub station_id: String,
    pub epoch: i64,
    pub obs_time_utc: i64,
    pub obs_time_local: String,

    // Solar
    pub solar_radiation_high: Option<f64>,
    pub uv_high: Option<f64>,

    // Wind direction (degrees)
    pub winddir_avg: Option<f64>,

    // Humidity (%)
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub humidity_avg: Option<f64>,

    // Temperature (°C)
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub temp_avg: Option<f64>,

    // Wind (km/h)
    pub windspeed_high: Option<f64>,
    pub windspeed_low: Option<f64>,
    pub windspeed_avg: Option<f64>,
    pub windgust_high: Option<f64>,
    pub windgust_low: Option<f64>,
    pub windgust_avg: Option<f64>,

    // Dew point (°C)
    pub dewpt_high: Option<f64>,
    pub dewpt_low: Option<f64>,
    pub dewpt_avg: Option<f64>,

    // Apparent temperature (°C)
    pub windchill_high: Option<f64>,
    pub windchill_low: Option<f64>,
    pub windchill_avg: Option<f64>,
    pub heatindex_high: Option<f64>,
    pub heatindex_low: Option<f64>,
    pub heatindex_avg: Option<f64>,

    // Pressure (hPa)
    pub pressure_max: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_trend: Option<f64>,

    // Precipitation (mm, mm/h)
    pub precip_rate: Option<f64>,
    pub precip_total: Option<f64>,

    pub qc_status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ObservationRow {
    pub fn utc_time(&self) -> Option<DateTime<Utc>> {
        utc_from_epoch(self.obs_time_utc)
    }

    pub fn qc(&self) -> QcStatus {
        QcStatus::from(self.qc_status)
    }
}

/// Aggregates over a trailing window; zero where nothing was observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationStats {
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub avg_humidity: f64,
}

/// Station plus a summary of its stored observations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationOverview {
    pub station: StationRow,
    pub observation_count: i64,
    pub last_observation_local: Option<String>,
}

/// One local calendar day for a station
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub station_id: String,
    pub date: NaiveDate,
    pub temperature_avg: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub precipitation_total: Option<f64>,
    pub wind_speed_max: Option<f64>,
    pub observation_count: i64,
    pub observations: Vec<ObservationRow>,
}
