//! Database schema management for `airquality-etl`.
//!
//! Ensures the `locations` and `measurements` tables and their indexes exist
//! before the pipeline, the seeder or the read API touch the store.

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Result of [`create_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    // ---
    /// Tables were created by this call.
    Created,
    /// Tables already existed; nothing changed.
    AlreadyInitialized,
}

/// Create the database schema (idempotent).
///
/// Safe to call on every startup. An existing schema is reported as
/// [`SchemaStatus::AlreadyInitialized`], never as an error. Errors are
/// propagated only if a statement genuinely fails.
pub async fn create_schema(pool: &SqlitePool) -> Result<SchemaStatus> {
    // ---
    let mut tx = pool.begin().await?;

    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('locations', 'measurements')",
    )
    .fetch_one(&mut *tx)
    .await?;

    // Monitored cities, unique per (city, country)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            city          TEXT     NOT NULL,
            country       TEXT     NOT NULL,
            latitude      REAL,
            longitude     REAL,
            last_updated  DATETIME NOT NULL,
            CONSTRAINT unique_city_country UNIQUE (city, country)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Append-only log of pollutant readings
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurements (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id       INTEGER  NOT NULL REFERENCES locations (id),
            parameter         TEXT     NOT NULL,
            value             REAL     NOT NULL,
            unit              TEXT,
            measurement_date  DATETIME NOT NULL,
            created_at        DATETIME NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Dedup key for idempotent ingestion of overlapping windows
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_measurements_dedup
            ON measurements (location_id, parameter, measurement_date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_measurements_date
            ON measurements (measurement_date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let status = if existing == 2 {
        SchemaStatus::AlreadyInitialized
    } else {
        SchemaStatus::Created
    };
    tracing::debug!("Schema status: {:?}", status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        // ---
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();

        assert_eq!(create_schema(&pool).await.unwrap(), SchemaStatus::Created);
        assert_eq!(
            create_schema(&pool).await.unwrap(),
            SchemaStatus::AlreadyInitialized
        );

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('locations', 'measurements')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn test_natural_key_is_unique() {
        // ---
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        create_schema(&pool).await.unwrap();

        let insert = "INSERT INTO locations (city, country, latitude, longitude, last_updated) \
                      VALUES ('Paris', 'FR', 48.8566, 2.3522, '2024-01-01T00:00:00+00:00')";
        sqlx::query(insert).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).execute(&pool).await.is_err());
    }
}
