//! Store operations for stations and observations

use crate::schema::{
    default_station_name, DailySummary, ObservationRow, StationOverview, StationRow, StationStats,
};
use crate::{DbClient, DbError, DbResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, instrument};
use wxmon_core::{round1, NewObservation, ObservationEnvelope, RawObservation};

/// Per-batch ingestion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Newly inserted rows
    pub saved: usize,
    /// Records already present for their (station, epoch)
    pub duplicates: usize,
    /// Records that could not be decoded, converted or parsed
    pub rejected: usize,
    /// Records lost to a database failure
    pub store_failures: usize,
}

impl BatchReport {
    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn total(&self) -> usize {
        self.saved + self.duplicates + self.rejected + self.store_failures
    }
}

/// Insert the station if unknown and return the stored row
///
/// First write wins: coordinates and timezone of an existing station are
/// never touched.
async fn upsert_station(
    conn: &mut SqliteConnection,
    station_id: &str,
    latitude: f64,
    longitude: f64,
    timezone: &str,
) -> DbResult<StationRow> {
    if station_id.trim().is_empty() {
        return Err(DbError::Conversion("empty station id".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO stations (station_id, latitude, longitude, timezone, name, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (station_id) DO NOTHING
        "#,
    )
    .bind(station_id)
    .bind(latitude)
    .bind(longitude)
    .bind(timezone)
    .bind(default_station_name(station_id))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        info!(station_id, "New station created");
    }

    let station = sqlx::query_as::<_, StationRow>("SELECT * FROM stations WHERE station_id = ?")
        .bind(station_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(station)
}

async fn insert_observation(
    conn: &mut SqliteConnection,
    obs: &NewObservation,
) -> Result<ObservationRow, sqlx::Error> {
    let now = Utc::now();
    let m = &obs.metric;

    sqlx::query_as::<_, ObservationRow>(
        r#"
        INSERT INTO observations (
            station_id, epoch, obs_time_utc, obs_time_local,
            solar_radiation_high, uv_high, winddir_avg,
            humidity_high, humidity_low, humidity_avg,
            temp_high, temp_low, temp_avg,
            windspeed_high, windspeed_low, windspeed_avg,
            windgust_high, windgust_low, windgust_avg,
            dewpt_high, dewpt_low, dewpt_avg,
            windchill_high, windchill_low, windchill_avg,
            heatindex_high, heatindex_low, heatindex_avg,
            pressure_max, pressure_min, pressure_trend,
            precip_rate, precip_total,
            qc_status, created_at, updated_at
        ) VALUES (
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        )
        RETURNING *
        "#,
    )
    .bind(&obs.station_id)
    .bind(obs.epoch)
    .bind(obs.epoch)
    .bind(obs.obs_time_local.to_storage_string())
    .bind(obs.solar_radiation_high)
    .bind(obs.uv_high)
    .bind(obs.winddir_avg)
    .bind(obs.humidity_high)
    .bind(obs.humidity_low)
    .bind(obs.humidity_avg)
    .bind(m.temp_high)
    .bind(m.temp_low)
    .bind(m.temp_avg)
    .bind(m.windspeed_high)
    .bind(m.windspeed_low)
    .bind(m.windspeed_avg)
    .bind(m.windgust_high)
    .bind(m.windgust_low)
    .bind(m.windgust_avg)
    .bind(m.dewpt_high)
    .bind(m.dewpt_low)
    .bind(m.dewpt_avg)
    .bind(m.windchill_high)
    .bind(m.windchill_low)
    .bind(m.windchill_avg)
    .bind(m.heatindex_high)
    .bind(m.heatindex_low)
    .bind(m.heatindex_avg)
    .bind(m.pressure_max)
    .bind(m.pressure_min)
    .bind(m.pressure_trend)
    .bind(m.precip_rate)
    .bind(m.precip_total)
    .bind(obs.qc_status.code())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

impl DbClient {
    /// Look up a station by id, creating it from the given metadata if unknown
    #[instrument(skip(self))]
    pub async fn get_or_create_station(
        &self,
        station_id: &str,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> DbResult<StationRow> {
        let mut conn = self.pool().acquire().await?;
        upsert_station(&mut conn, station_id, latitude, longitude, timezone).await
    }

    /// Save one observation
    ///
    /// Returns `Ok(None)` when the (station, epoch) pair is already stored.
    /// Everything happens in one transaction; any error rolls it back,
    /// including a station created for this record.
    #[instrument(skip(self, raw), fields(station_id = %raw.station_id, epoch = raw.epoch))]
    pub async fn save_observation(&self, raw: &RawObservation) -> DbResult<Option<ObservationRow>> {
        let mut tx = self.pool().begin().await?;

        // The station upsert is a write, so the transaction holds the write
        // lock before the duplicate check below.
        let station = upsert_station(&mut tx, &raw.station_id, raw.lat, raw.lon, &raw.tz).await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM observations WHERE station_id = ? AND epoch = ?")
                .bind(&station.station_id)
                .bind(raw.epoch)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            tx.rollback().await?;
            debug!("Observation already stored, skipping");
            return Ok(None);
        }

        let obs = raw.normalize()?;

        let row = match insert_observation(&mut tx, &obs).await {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                debug!("Observation inserted concurrently, skipping");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;

        info!(
            local_time = %row.obs_time_local,
            temp_avg = ?row.temp_avg,
            "Observation saved"
        );
        Ok(Some(row))
    }

    /// Save every record of a batch, isolating per-record failures
    #[instrument(skip(self, envelope), fields(records = envelope.observations.len()))]
    pub async fn save_batch(&self, envelope: &ObservationEnvelope) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, value) in envelope.observations.iter().enumerate() {
            let raw = match RawObservation::from_value(value.clone()) {
                Ok(raw) => raw,
                Err(err) => {
                    error!(index, error = %err, "Rejected observation record");
                    report.rejected += 1;
                    continue;
                }
            };

            match self.save_observation(&raw).await {
                Ok(Some(_)) => report.saved += 1,
                Ok(None) => report.duplicates += 1,
                Err(DbError::Conversion(msg)) => {
                    error!(index, station_id = %raw.station_id, epoch = raw.epoch, error = %msg, "Rejected observation record");
                    report.rejected += 1;
                }
                Err(err) => {
                    error!(index, station_id = %raw.station_id, epoch = raw.epoch, error = %err, "Failed to store observation");
                    report.store_failures += 1;
                }
            }
        }

        info!(
            saved = report.saved,
            duplicates = report.duplicates,
            rejected = report.rejected,
            store_failures = report.store_failures,
            "Batch processed"
        );
        report
    }

    /// Most recent observation for a station by UTC time
    #[instrument(skip(self))]
    pub async fn latest_observation(&self, station_id: &str) -> DbResult<Option<ObservationRow>> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT * FROM observations
            WHERE station_id = ?
            ORDER BY obs_time_utc DESC, epoch DESC
            LIMIT 1
            "#,
        )
        .bind(station_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Temperature and humidity aggregates over the last `window_days` days
    ///
    /// A window reaching past the earliest representable time covers
    /// everything stored.
    #[instrument(skip(self))]
    pub async fn stats(&self, station_id: &str, window_days: u32) -> DbResult<StationStats> {
        let since = Utc::now()
            .checked_sub_signed(chrono::Duration::days(i64::from(window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.stats_since(station_id, since).await
    }

    /// Temperature and humidity aggregates for observations at or after `since`
    #[instrument(skip(self))]
    pub async fn stats_since(&self, station_id: &str, since: DateTime<Utc>) -> DbResult<StationStats> {
        let (avg_temp, max_temp, min_temp, avg_humidity): (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
        ) = sqlx::query_as(
            r#"
            SELECT AVG(temp_avg), MAX(temp_high), MIN(temp_low), AVG(humidity_avg)
            FROM observations
            WHERE station_id = ? AND obs_time_utc >= ?
            "#,
        )
        .bind(station_id)
        .bind(since.timestamp())
        .fetch_one(self.pool())
        .await?;

        Ok(StationStats {
            avg_temp: round1(avg_temp.unwrap_or(0.0)),
            max_temp: round1(max_temp.unwrap_or(0.0)),
            min_temp: round1(min_temp.unwrap_or(0.0)),
            avg_humidity: round1(avg_humidity.unwrap_or(0.0)),
        })
    }

    /// Get a station by id
    #[instrument(skip(self))]
    pub async fn get_station(&self, station_id: &str) -> DbResult<StationRow> {
        sqlx::query_as::<_, StationRow>("SELECT * FROM stations WHERE station_id = ?")
            .bind(station_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DbError::NotFound(format!("station {}", station_id)))
    }

    /// Change a station's display name
    #[instrument(skip(self))]
    pub async fn rename_station(&self, station_id: &str, name: &str) -> DbResult<StationRow> {
        let station = sqlx::query_as::<_, StationRow>(
            "UPDATE stations SET name = ? WHERE station_id = ? RETURNING *",
        )
        .bind(name)
        .bind(station_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DbError::NotFound(format!("station {}", station_id)))?;

        debug!("Renamed station {} to {:?}", station_id, name);
        Ok(station)
    }

    /// All stations with observation counts and their latest local time
    #[instrument(skip(self))]
    pub async fn list_stations(&self) -> DbResult<Vec<StationOverview>> {
        let rows: Vec<(String, f64, f64, String, String, DateTime<Utc>, i64, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT
                    s.station_id, s.latitude, s.longitude, s.timezone, s.name, s.created_at,
                    (SELECT COUNT(*) FROM observations o WHERE o.station_id = s.station_id),
                    (SELECT o.obs_time_local FROM observations o
                        WHERE o.station_id = s.station_id
                        ORDER BY o.obs_time_utc DESC LIMIT 1)
                FROM stations s
                ORDER BY s.station_id ASC
                "#,
            )
            .fetch_all(self.pool())
            .await?;

        let overviews = rows
            .into_iter()
            .map(
                |(station_id, latitude, longitude, timezone, name, created_at, count, last)| {
                    StationOverview {
                        station: StationRow {
                            station_id,
                            latitude,
                            longitude,
                            timezone,
                            name,
                            created_at,
                        },
                        observation_count: count,
                        last_observation_local: last,
                    }
                },
            )
            .collect::<Vec<_>>();

        debug!("Listed {} stations", overviews.len());
        Ok(overviews)
    }

    /// Observations and aggregates for one local calendar day
    #[instrument(skip(self))]
    pub async fn daily_summary(&self, station_id: &str, date: NaiveDate) -> DbResult<DailySummary> {
        let station = self.get_station(station_id).await?;
        let day = date.format("%Y-%m-%d").to_string();

        let observations = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT * FROM observations
            WHERE station_id = ? AND substr(obs_time_local, 1, 10) = ?
            ORDER BY obs_time_local ASC, epoch ASC
            "#,
        )
        .bind(&station.station_id)
        .bind(&day)
        .fetch_all(self.pool())
        .await?;

        let (temp_avg, temp_max, temp_min, humidity_avg, precip_total, wind_max, count): (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT AVG(temp_avg), MAX(temp_high), MIN(temp_low), AVG(humidity_avg),
                   MAX(precip_total), MAX(windspeed_high), COUNT(*)
            FROM observations
            WHERE station_id = ? AND substr(obs_time_local, 1, 10) = ?
            "#,
        )
        .bind(&station.station_id)
        .bind(&day)
        .fetch_one(self.pool())
        .await?;

        Ok(DailySummary {
            station_id: station.station_id,
            date,
            temperature_avg: temp_avg.map(round1),
            temperature_max: temp_max,
            temperature_min: temp_min,
            humidity_avg: humidity_avg.map(round1),
            precipitation_total: precip_total,
            wind_speed_max: wind_max,
            observation_count: count,
            observations,
        })
    }

    /// Count stored observations, optionally for one station
    #[instrument(skip(self))]
    pub async fn count_observations(&self, station_id: Option<&str>) -> DbResult<i64> {
        let count: i64 = match station_id {
            Some(id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE station_id = ?")
                    .bind(id)
                    .fetch_one(self.pool())
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM observations")
                    .fetch_one(self.pool())
                    .await?
            }
        };

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_report_totals() {
        let report = BatchReport {
            saved: 2,
            duplicates: 3,
            rejected: 1,
            store_failures: 0,
        };
        assert_eq!(report.saved(), 2);
        assert_eq!(report.total(), 6);
    }
}
