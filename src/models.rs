//! Data models for the air-quality pipeline.
//!
//! Three families of records live here:
//! - [`RawObservation`]: what the extractor emits, one per (city, hour, pollutant)
//! - [`LocationRow`] / [`MeasurementRow`]: the transformer's normalized tables
//! - [`Location`], [`Measurement`], [`MeasurementView`]: rows as read back from the store

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Unit reported by the air-quality source for every tracked pollutant.
pub const MICROGRAMS_PER_CUBIC_METRE: &str = "µg/m³";

/// The six pollutants requested from the air-quality source.
///
/// Declaration order is the emission order within a single timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    // ---
    Pm25,
    Pm10,
    CarbonMonoxide,
    NitrogenDioxide,
    SulphurDioxide,
    Ozone,
}

impl Pollutant {
    // ---
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::CarbonMonoxide,
        Pollutant::NitrogenDioxide,
        Pollutant::SulphurDioxide,
        Pollutant::Ozone,
    ];

    /// Field name used by the upstream API for this series.
    pub fn api_code(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm2_5",
            Pollutant::Pm10 => "pm10",
            Pollutant::CarbonMonoxide => "carbon_monoxide",
            Pollutant::NitrogenDioxide => "nitrogen_dioxide",
            Pollutant::SulphurDioxide => "sulphur_dioxide",
            Pollutant::Ozone => "ozone",
        }
    }

    /// Parameter name as stored in `measurements.parameter`.
    pub fn name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::CarbonMonoxide => "co",
            Pollutant::NitrogenDioxide => "no2",
            Pollutant::SulphurDioxide => "so2",
            Pollutant::Ozone => "o3",
        }
    }

    pub fn unit(self) -> &'static str {
        MICROGRAMS_PER_CUBIC_METRE
    }

    /// Comma-joined API codes, as sent in the `hourly` query parameter.
    pub fn hourly_query() -> String {
        // ---
        let codes: Vec<&str> = Self::ALL.iter().map(|p| p.api_code()).collect();
        codes.join(",")
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reading as produced by the extractor, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    // ---
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub parameter: String,
    pub value: Option<f64>,
    pub unit: String,
    /// Timestamp as handed over by the extractor; parsed by the transformer.
    pub date: Option<String>,
}

/// Parse a timestamp without an offset, as the air-quality API and the demo
/// data write them (`2024-01-01T13:00`, `2024-01-01T13:00:00`, `2024-01-01 13:00:00`).
pub fn parse_naive_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// A unique monitored location, keyed by `(city, country)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRow {
    // ---
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A validated measurement that still references its location by natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    // ---
    pub city: String,
    pub country: String,
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub measurement_date: DateTime<Utc>,
}

/// Output of one transform pass: the two tables handed to the loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformed {
    // ---
    pub locations: Vec<LocationRow>,
    pub measurements: Vec<MeasurementRow>,
}

impl Transformed {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.measurements.is_empty()
    }
}

/// Persisted location row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Location {
    // ---
    pub id: i64,
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// Persisted measurement row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Measurement {
    // ---
    pub id: i64,
    pub location_id: i64,
    pub parameter: String,
    pub value: f64,
    pub unit: Option<String>,
    pub measurement_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Measurement joined with its location, as served to the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeasurementView {
    // ---
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub parameter: String,
    pub value: f64,
    pub unit: Option<String>,
    pub measurement_date: DateTime<Utc>,
}

/// Store-wide totals reported at the end of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    // ---
    pub locations: i64,
    pub measurements: i64,
    pub last_measurement: Option<DateTime<Utc>>,
}

/// Totals shown in the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    // ---
    pub total_measurements: i64,
    pub total_cities: i64,
    pub total_countries: i64,
    pub last_update: Option<DateTime<Utc>>,
}

/// Per-city mean of one parameter, used for the city ranking.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CityAverage {
    // ---
    pub city: String,
    pub country: String,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub samples: i64,
}

/// Diagnostic aggregate over one `(city, parameter)` group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterStats {
    // ---
    pub city: String,
    pub parameter: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}
