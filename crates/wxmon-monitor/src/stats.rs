//! Read-only reporting over stored observations

use chrono::NaiveDate;
use wxmon_db::{DailySummary, DbClient, DbResult, ObservationRow, StationOverview, StationStats};

/// Window used when the caller does not pick one
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Thin query facade over the observation store; holds no state of its own
#[derive(Clone)]
pub struct StatsQuery {
    db: DbClient,
}

impl StatsQuery {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Aggregates over the last `window_days` days; all zero when empty
    pub async fn stats(&self, station_id: &str, window_days: u32) -> DbResult<StationStats> {
        self.db.stats(station_id, window_days).await
    }

    pub async fn latest(&self, station_id: &str) -> DbResult<Option<ObservationRow>> {
        self.db.latest_observation(station_id).await
    }

    pub async fn daily(&self, station_id: &str, date: NaiveDate) -> DbResult<DailySummary> {
        self.db.daily_summary(station_id, date).await
    }

    pub async fn stations(&self) -> DbResult<Vec<StationOverview>> {
        self.db.list_stations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wxmon_core::ObservationEnvelope;

    async fn seeded() -> StatsQuery {
        let db = DbClient::in_memory().await.unwrap();
        let now = chrono::Utc::now().timestamp();
        let envelope: ObservationEnvelope = serde_json::from_value(json!({
            "observations": [
                {
                    "stationID": "X1", "lat": 1.0, "lon": 2.0, "tz": "UTC",
                    "epoch": now - 60, "obsTimeLocal": "2024-01-01 00:00:00",
                    "humidityAvg": 50.0,
                    "imperial": { "tempAvg": 68.0, "tempHigh": 77.0, "tempLow": 59.0 }
                },
                {
                    "stationID": "X1", "lat": 1.0, "lon": 2.0, "tz": "UTC",
                    "epoch": now - 30, "obsTimeLocal": "2024-01-01 00:05:00",
                    "humidityAvg": 70.0,
                    "imperial": { "tempAvg": 50.0, "tempHigh": 50.0, "tempLow": 41.0 }
                }
            ]
        }))
        .unwrap();
        assert_eq!(db.save_batch(&envelope).await.saved(), 2);
        StatsQuery::new(db)
    }

    #[tokio::test]
    async fn test_stats_delegates_to_store() {
        let query = seeded().await;

        let stats = query.stats("X1", DEFAULT_WINDOW_DAYS).await.unwrap();
        assert_eq!(stats.avg_temp, 15.0);
        assert_eq!(stats.max_temp, 25.0);
        assert_eq!(stats.min_temp, 5.0);
        assert_eq!(stats.avg_humidity, 60.0);

        let latest = query.latest("X1").await.unwrap().unwrap();
        assert_eq!(latest.temp_avg, Some(10.0));
    }

    #[tokio::test]
    async fn test_unknown_station_reports_zeros() {
        let query = seeded().await;
        assert_eq!(query.stats("NOPE", 7).await.unwrap(), StationStats::default());
        assert!(query.latest("NOPE").await.unwrap().is_none());
        assert_eq!(query.stations().await.unwrap().len(), 1);
    }
}
