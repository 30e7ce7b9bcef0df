//! Extract stage: pull the trailing 24 hours of hourly pollutant readings for
//! every monitored city in the requested countries.
//!
//! Cities are fetched one after another. A city whose request or response
//! fails is logged and skipped; the run carries on with the remaining cities.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{parse_naive_timestamp, Pollutant, RawObservation};
use crate::Config;

// ---

/// A city in the static monitoring registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    // ---
    pub name: &'static str,
    pub country: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    // ---
    const fn new(
        name: &'static str,
        country: &'static str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            name,
            country,
            latitude,
            longitude,
        }
    }
}

/// Monitored cities, in extraction order.
pub const CITIES: &[City] = &[
    City::new("Paris", "FR", 48.8566, 2.3522),
    City::new("Lyon", "FR", 45.7640, 4.8357),
    City::new("Marseille", "FR", 43.2965, 5.3698),
    City::new("Berlin", "DE", 52.5200, 13.4050),
    City::new("Munich", "DE", 48.1351, 11.5820),
    City::new("Madrid", "ES", 40.4168, -3.7038),
    City::new("Barcelona", "ES", 41.3851, 2.1734),
    City::new("Rome", "IT", 41.9028, 12.4964),
    City::new("Milan", "IT", 45.4642, 9.1900),
    City::new("Brussels", "BE", 50.8503, 4.3517),
    City::new("Amsterdam", "NL", 52.3676, 4.9041),
    City::new("Zurich", "CH", 47.3769, 8.5417),
];

/// Length of the trailing extraction window.
pub const WINDOW_HOURS: i64 = 24;

/// Registry cities whose country is in `countries`, in registry order.
///
/// Unknown country codes simply match nothing.
pub fn cities_for(countries: &[String]) -> Vec<&'static City> {
    // ---
    CITIES
        .iter()
        .filter(|c| countries.iter().any(|code| code.eq_ignore_ascii_case(c.country)))
        .collect()
}

/// Calendar dates bounding the trailing window that ends at `now`.
///
/// The source reads both dates in the city's local time. Every monitored city
/// sits at or ahead of UTC, so the end date runs one day past the UTC date to
/// keep the latest local hours inside the requested range.
pub fn trailing_window(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    // ---
    let start = now - chrono::Duration::hours(WINDOW_HOURS);
    let end = now.date_naive() + chrono::Days::new(1);
    (start.date_naive(), end)
}

/// Why a single city contributed no observations.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ---
    #[error("Network request failed for {city}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {city} with status {status}")]
    HttpStatus {
        city: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response body for {city}")]
    Decode {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No hourly data in response for {city}")]
    MissingHourly { city: String },

    #[error("No timestamps in hourly data for {city}")]
    MissingTimestamps { city: String },
}

impl ExtractError {
    /// The body decoded but carried nothing to extract.
    pub fn is_missing_data(&self) -> bool {
        match self {
            Self::MissingHourly { .. } | Self::MissingTimestamps { .. } => true,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::Decode { .. } => false,
        }
    }
}

/// Response body of the air-quality endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct AirQualityResponse {
    // ---
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Offset of the returned wall-clock times from UTC.
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub hourly: Option<HourlySeries>,
}

/// Hourly block: a time axis plus one aligned array per pollutant.
#[derive(Debug, Default, Deserialize)]
pub struct HourlySeries {
    // ---
    #[serde(default)]
    pub time: Vec<Option<String>>,
    pub pm2_5: Option<Vec<Option<f64>>>,
    pub pm10: Option<Vec<Option<f64>>>,
    pub carbon_monoxide: Option<Vec<Option<f64>>>,
    pub nitrogen_dioxide: Option<Vec<Option<f64>>>,
    pub sulphur_dioxide: Option<Vec<Option<f64>>>,
    pub ozone: Option<Vec<Option<f64>>>,
}

impl HourlySeries {
    /// Samples for `pollutant`, if the response carried that series.
    pub fn series(&self, pollutant: Pollutant) -> Option<&[Option<f64>]> {
        // ---
        let values = match pollutant {
            Pollutant::Pm25 => &self.pm2_5,
            Pollutant::Pm10 => &self.pm10,
            Pollutant::CarbonMonoxide => &self.carbon_monoxide,
            Pollutant::NitrogenDioxide => &self.nitrogen_dioxide,
            Pollutant::SulphurDioxide => &self.sulphur_dioxide,
            Pollutant::Ozone => &self.ozone,
        };
        values.as_deref()
    }
}

/// Turn one city's response into observations.
///
/// For each timestamp, one observation per pollutant present and non-null at
/// that index, in [`Pollutant::ALL`] order. Null or missing samples are dropped,
/// and so is every sample at a null timestamp.
pub fn parse_observations(
    response: &AirQualityResponse,
    city: &City,
) -> Result<Vec<RawObservation>, ExtractError> {
    // ---
    let hourly = response.hourly.as_ref().ok_or_else(|| ExtractError::MissingHourly {
        city: city.name.to_string(),
    })?;

    if hourly.time.is_empty() {
        return Err(ExtractError::MissingTimestamps {
            city: city.name.to_string(),
        });
    }

    let latitude = response.latitude.unwrap_or(city.latitude);
    let longitude = response.longitude.unwrap_or(city.longitude);

    let mut observations = Vec::new();
    for (i, stamp) in hourly.time.iter().enumerate() {
        let Some(stamp) = stamp else {
            debug!("Null timestamp at index {} for {}, skipping", i, city.name);
            continue;
        };
        let date = to_utc_string(stamp, response.utc_offset_seconds);
        for pollutant in Pollutant::ALL {
            let samples = hourly.series(pollutant).unwrap_or_default();
            let Some(value) = samples.get(i).copied().flatten() else {
                continue;
            };
            observations.push(RawObservation {
                city: city.name.to_string(),
                country: city.country.to_string(),
                latitude,
                longitude,
                parameter: pollutant.name().to_string(),
                value: Some(value),
                unit: pollutant.unit().to_string(),
                date: Some(date.clone()),
            });
        }
    }

    Ok(observations)
}

/// Convert a wall-clock stamp at `offset_seconds` from UTC into RFC 3339 UTC.
///
/// Stamps that already carry an offset are normalized as-is. Anything
/// unparseable is returned verbatim for the transformer to reject.
fn to_utc_string(stamp: &str, offset_seconds: i32) -> String {
    // ---
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(stamp) {
        return with_offset
            .with_timezone(&Utc)
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    }
    match parse_naive_timestamp(stamp) {
        Some(local) => {
            let utc = local - chrono::Duration::seconds(i64::from(offset_seconds));
            Utc.from_utc_datetime(&utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        }
        None => stamp.to_string(),
    }
}

/// HTTP client for the air-quality source.
#[derive(Debug, Clone)]
pub struct Extractor {
    // ---
    client: reqwest::Client,
    base_url: String,
    timezone: String,
}

impl Extractor {
    // ---
    pub fn new(cfg: &Config) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.api_timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: cfg.api_url.clone(),
            timezone: cfg.api_timezone.clone(),
        })
    }

    /// Fetch the trailing window for every registry city in `countries`.
    ///
    /// `limit` is a result-count hint; the trailing window already bounds the
    /// volume, so it is recorded but does not truncate the output.
    pub async fn extract_latest_measurements(
        &self,
        countries: &[String],
        limit: u32,
    ) -> Vec<RawObservation> {
        // ---
        let (start, end) = trailing_window(Utc::now());
        let cities = cities_for(countries);

        debug!(
            "Extracting {} cities for [{}] from {} to {} (limit hint {})",
            cities.len(),
            countries.join(","),
            start,
            end,
            limit
        );

        let mut all = Vec::new();
        for city in cities {
            info!("Extracting data for {}...", city.name);
            match self.fetch_city(city, start, end).await {
                Ok(observations) => {
                    info!(
                        "{} observations extracted for {}",
                        observations.len(),
                        city.name
                    );
                    all.extend(observations);
                }
                Err(e) if e.is_missing_data() => {
                    warn!("{}", e);
                }
                Err(e) => {
                    error!("Extraction failed: {} ({})", e, root_cause(&e));
                }
            }
        }

        info!("Extracted {} observations in total", all.len());
        all
    }

    async fn fetch_city(
        &self,
        city: &City,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawObservation>, ExtractError> {
        // ---
        let params = [
            ("latitude", city.latitude.to_string()),
            ("longitude", city.longitude.to_string()),
            ("hourly", Pollutant::hourly_query()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("timezone", self.timezone.clone()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ExtractError::Transport {
                city: city.name.to_string(),
                source,
            })?;

        let status = response.status();
        let response = response
            .error_for_status()
            .map_err(|source| ExtractError::HttpStatus {
                city: city.name.to_string(),
                status,
                source,
            })?;

        let body: AirQualityResponse =
            response.json().await.map_err(|source| ExtractError::Decode {
                city: city.name.to_string(),
                source,
            })?;

        parse_observations(&body, city)
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    // ---
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
