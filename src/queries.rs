//! Read-side queries backing the dashboard contract.
//!
//! These never write. The join query and the stats query are what the
//! dashboard renders its time series, ranking, map and summary table from.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::parse_countries;
use crate::models::{CityAverage, DashboardStats, MeasurementView};

// ---

pub const DEFAULT_MEASUREMENT_LIMIT: u32 = 1000;
pub const DEFAULT_RANKING_LIMIT: u32 = 10;

/// Optional filters for [`fetch_measurements`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MeasurementFilter {
    // ---
    /// Comma-separated country codes.
    pub country: Option<String>,
    pub city: Option<String>,
    pub parameter: Option<String>,
    pub limit: Option<u32>,
}

/// Measurements joined with their location, newest first.
pub async fn fetch_measurements(
    pool: &SqlitePool,
    filter: &MeasurementFilter,
) -> Result<Vec<MeasurementView>> {
    // ---
    let countries = filter
        .country
        .as_deref()
        .map(parse_countries)
        .unwrap_or_default();
    let limit = filter.limit.unwrap_or(DEFAULT_MEASUREMENT_LIMIT);

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT
            l.city, l.country, l.latitude, l.longitude,
            m.parameter, m.value, m.unit, m.measurement_date
        FROM measurements m
        JOIN locations l ON m.location_id = l.id
        WHERE 1 = 1
        "#,
    );

    push_country_filter(&mut qb, &countries);
    if let Some(city) = &filter.city {
        qb.push(" AND l.city = ").push_bind(city.clone());
    }
    if let Some(parameter) = &filter.parameter {
        qb.push(" AND m.parameter = ").push_bind(parameter.clone());
    }
    qb.push(" ORDER BY m.measurement_date DESC, l.city, m.parameter LIMIT ")
        .push_bind(i64::from(limit));

    let query = qb.build_query_as::<MeasurementView>();
    let rows = query.fetch_all(pool).await?;
    Ok(rows)
}

/// Header totals: measurements, distinct cities, distinct countries, latest reading.
pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    // ---
    let total_measurements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurements")
        .fetch_one(pool)
        .await?;

    let total_cities: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT city) FROM locations")
        .fetch_one(pool)
        .await?;

    let total_countries: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT country) FROM locations")
        .fetch_one(pool)
        .await?;

    let last_update: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT measurement_date FROM measurements ORDER BY measurement_date DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(DashboardStats {
        total_measurements,
        total_cities,
        total_countries,
        last_update,
    })
}

/// Cities ranked by their mean value of `parameter`, highest first.
pub async fn city_rankings(
    pool: &SqlitePool,
    parameter: &str,
    countries: &[String],
    limit: u32,
) -> Result<Vec<CityAverage>> {
    // ---
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT
            l.city, l.country,
            AVG(m.value) AS average,
            MIN(m.value) AS minimum,
            MAX(m.value) AS maximum,
            COUNT(*)     AS samples
        FROM measurements m
        JOIN locations l ON m.location_id = l.id
        WHERE m.parameter = "#,
    );
    qb.push_bind(parameter.to_string());
    push_country_filter(&mut qb, countries);
    qb.push(" GROUP BY l.id, l.city, l.country ORDER BY average DESC, l.city LIMIT ")
        .push_bind(i64::from(limit));

    let rows = qb.build_query_as::<CityAverage>().fetch_all(pool).await?;
    Ok(rows)
}

fn push_country_filter(qb: &mut QueryBuilder<'_, Sqlite>, countries: &[String]) {
    // ---
    if countries.is_empty() {
        return;
    }
    qb.push(" AND l.country IN (");
    let mut list = qb.separated(", ");
    for country in countries {
        list.push_bind(country.clone());
    }
    list.push_unseparated(")");
}
