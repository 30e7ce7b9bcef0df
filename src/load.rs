//! Load stage: merge one run's transformed tables into the SQLite store.
//!
//! Everything a run writes goes through a single transaction: location
//! upserts and measurement inserts either all commit or all roll back.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::models::{StoreStats, Transformed};

// ---

/// What one load wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    // ---
    pub locations_inserted: usize,
    pub locations_updated: usize,
    pub measurements_inserted: usize,
    /// Already present for the same location, parameter and timestamp.
    pub measurements_skipped: usize,
    /// Referenced a `(city, country)` pair with no location row in this run.
    pub measurements_unresolved: usize,
}

/// Writes transformed runs into the store and reports store-wide totals.
#[derive(Debug, Clone)]
pub struct Loader {
    // ---
    pool: SqlitePool,
}

impl Loader {
    // ---
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert locations and insert new measurements in one transaction.
    ///
    /// Empty input is a no-op. On any error the transaction is rolled back and
    /// the error returned; no partial writes survive.
    pub async fn load_data(&self, data: &Transformed) -> Result<LoadSummary> {
        // ---
        if data.is_empty() {
            warn!("No data to load");
            return Ok(LoadSummary::default());
        }

        let mut tx = self.pool.begin().await?;

        match write_run(&mut *tx, data, Utc::now()).await {
            Ok(summary) => {
                tx.commit()
                    .await
                    .map_err(|e| anyhow!("Failed to commit load: {}", e))?;
                info!(
                    "Load committed: {} new / {} updated locations, {} new measurements ({} already present)",
                    summary.locations_inserted,
                    summary.locations_updated,
                    summary.measurements_inserted,
                    summary.measurements_skipped
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Load failed, rolling back: {:#}", e);
                if let Err(rollback) = tx.rollback().await {
                    error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Total locations, total measurements and the latest measurement time.
    pub async fn get_stats(&self) -> Result<StoreStats> {
        // ---
        let locations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;

        let measurements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurements")
            .fetch_one(&self.pool)
            .await?;

        let last_measurement: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT measurement_date FROM measurements ORDER BY measurement_date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(StoreStats {
            locations,
            measurements,
            last_measurement,
        })
    }
}

async fn write_run(
    conn: &mut SqliteConnection,
    data: &Transformed,
    now: DateTime<Utc>,
) -> Result<LoadSummary> {
    // ---
    let mut summary = LoadSummary::default();
    let mut location_ids: HashMap<(&str, &str), i64> = HashMap::new();

    debug!("Loading {} locations", data.locations.len());

    for loc in &data.locations {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM locations WHERE city = ? AND country = ?")
                .bind(&loc.city)
                .bind(&loc.country)
                .fetch_optional(&mut *conn)
                .await?;

        // The conflict clause keeps a racing run from creating a second row
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO locations (city, country, latitude, longitude, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (city, country) DO UPDATE SET
                latitude     = excluded.latitude,
                longitude    = excluded.longitude,
                last_updated = excluded.last_updated
            RETURNING id
            "#,
        )
        .bind(&loc.city)
        .bind(&loc.country)
        .bind(loc.latitude)
        .bind(loc.longitude)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        match existing {
            Some(_) => summary.locations_updated += 1,
            None => summary.locations_inserted += 1,
        }
        location_ids.insert((loc.city.as_str(), loc.country.as_str()), id);
    }

    debug!("Loading {} measurements", data.measurements.len());

    for m in &data.measurements {
        let Some(&location_id) = location_ids.get(&(m.city.as_str(), m.country.as_str())) else {
            debug!(
                "No location for {}/{}, skipping measurement",
                m.city, m.country
            );
            summary.measurements_unresolved += 1;
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO measurements (
                location_id, parameter, value, unit, measurement_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (location_id, parameter, measurement_date) DO NOTHING
            "#,
        )
        .bind(location_id)
        .bind(&m.parameter)
        .bind(m.value)
        .bind(&m.unit)
        .bind(m.measurement_date)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            summary.measurements_skipped += 1;
        } else {
            summary.measurements_inserted += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Location, LocationRow, Measurement, MeasurementRow};
    use crate::{db, schema};
    use chrono::TimeZone;

    async fn test_loader() -> Loader {
        // ---
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        schema::create_schema(&pool).await.unwrap();
        Loader::new(pool)
    }

    fn location(city: &str, country: &str, lat: f64, lon: f64) -> LocationRow {
        LocationRow {
            city: city.into(),
            country: country.into(),
            latitude: lat,
            longitude: lon,
        }
    }

    fn measurement(
        city: &str,
        country: &str,
        parameter: &str,
        hour: u32,
        value: f64,
    ) -> MeasurementRow {
        // ---
        MeasurementRow {
            city: city.into(),
            country: country.into(),
            parameter: parameter.into(),
            value,
            unit: "µg/m³".into(),
            measurement_date: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    async fn locations(loader: &Loader) -> Vec<Location> {
        sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY id")
            .fetch_all(loader.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        // ---
        let loader = test_loader().await;
        let summary = loader.load_data(&Transformed::default()).await.unwrap();
        assert_eq!(summary, LoadSummary::default());
        assert_eq!(loader.get_stats().await.unwrap().locations, 0);
    }

    #[tokio::test]
    async fn test_location_coordinates_are_updated_in_place() {
        // ---
        let loader = test_loader().await;

        let first = Transformed {
            locations: vec![location("Paris", "FR", 48.8566, 2.3522)],
            measurements: vec![measurement("Paris", "FR", "pm25", 0, 10.0)],
        };
        let summary = loader.load_data(&first).await.unwrap();
        assert_eq!(summary.locations_inserted, 1);

        let before = locations(&loader).await;
        std::thread::sleep(std::time::Duration::from_millis(5));

        let second = Transformed {
            locations: vec![location("Paris", "FR", 48.9, 2.4)],
            measurements: vec![measurement("Paris", "FR", "pm25", 1, 11.0)],
        };
        let summary = loader.load_data(&second).await.unwrap();
        assert_eq!(summary.locations_inserted, 0);
        assert_eq!(summary.locations_updated, 1);

        let after = locations(&loader).await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].latitude, Some(48.9));
        assert_eq!(after[0].longitude, Some(2.4));
        assert!(after[0].last_updated > before[0].last_updated);
    }

    #[tokio::test]
    async fn test_duplicate_measurements_are_skipped() {
        // ---
        let loader = test_loader().await;
        let data = Transformed {
            locations: vec![location("Lyon", "FR", 45.764, 4.8357)],
            measurements: vec![
                measurement("Lyon", "FR", "no2", 3, 21.0),
                measurement("Lyon", "FR", "no2", 3, 22.0),
                measurement("Lyon", "FR", "o3", 3, 40.0),
            ],
        };

        let summary = loader.load_data(&data).await.unwrap();
        assert_eq!(summary.measurements_inserted, 2);
        assert_eq!(summary.measurements_skipped, 1);

        let again = loader.load_data(&data).await.unwrap();
        assert_eq!(again.measurements_inserted, 0);
        assert_eq!(again.measurements_skipped, 3);

        // First reading for a dedup key wins and is never rewritten
        let stored = sqlx::query_as::<_, Measurement>("SELECT * FROM measurements ORDER BY id")
            .fetch_all(loader.pool())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].parameter, "no2");
        assert_eq!(stored[0].value, 21.0);
        assert_eq!(stored[0].unit.as_deref(), Some("µg/m³"));
        assert_eq!(stored[0].location_id, stored[1].location_id);
    }

    #[tokio::test]
    async fn test_unresolved_measurements_are_skipped() {
        // ---
        let loader = test_loader().await;
        let data = Transformed {
            locations: vec![location("Rome", "IT", 41.9028, 12.4964)],
            measurements: vec![
                measurement("Rome", "IT", "pm10", 0, 12.0),
                measurement("Milan", "IT", "pm10", 0, 30.0),
            ],
        };

        let summary = loader.load_data(&data).await.unwrap();
        assert_eq!(summary.measurements_inserted, 1);
        assert_eq!(summary.measurements_unresolved, 1);
    }

    #[tokio::test]
    async fn test_failed_load_rolls_back_everything() {
        // ---
        let loader = test_loader().await;
        sqlx::query("DROP TABLE measurements")
            .execute(loader.pool())
            .await
            .unwrap();

        let data = Transformed {
            locations: vec![location("Berlin", "DE", 52.52, 13.405)],
            measurements: vec![measurement("Berlin", "DE", "pm25", 0, 8.0)],
        };

        assert!(loader.load_data(&data).await.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(loader.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_get_stats_reports_latest_measurement() {
        // ---
        let loader = test_loader().await;
        let empty = loader.get_stats().await.unwrap();
        assert_eq!(empty.measurements, 0);
        assert_eq!(empty.last_measurement, None);

        let data = Transformed {
            locations: vec![location("Madrid", "ES", 40.4168, -3.7038)],
            measurements: vec![
                measurement("Madrid", "ES", "co", 7, 200.0),
                measurement("Madrid", "ES", "co", 9, 210.0),
                measurement("Madrid", "ES", "co", 8, 205.0),
            ],
        };
        loader.load_data(&data).await.unwrap();

        let stats = loader.get_stats().await.unwrap();
        assert_eq!(stats.locations, 1);
        assert_eq!(stats.measurements, 3);
        assert_eq!(
            stats.last_measurement,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
        );
    }
}
