//! Demo-data seeding for an empty store.
//!
//! The demo file mirrors the transform output: a `locations` array and a
//! `measurements` array keyed by `(city, country)`. It is written through
//! [`Loader::load_data`], so seeding gets the same upsert and dedup rules as
//! a pipeline run.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::load::Loader;
use crate::models::{LocationRow, MeasurementRow, Transformed};
use crate::transform::parse_timestamp;

// ---

#[derive(Debug, Deserialize)]
struct DemoData {
    // ---
    locations: Vec<LocationRow>,
    measurements: Vec<DemoMeasurement>,
}

#[derive(Debug, Deserialize)]
struct DemoMeasurement {
    // ---
    city: String,
    country: String,
    parameter: String,
    value: f64,
    unit: String,
    measurement_date: String,
}

/// Result of [`load_demo_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    // ---
    /// The store already holds measurements; nothing was written.
    AlreadyPopulated,
    /// No demo file at the given path.
    FileMissing,
    Loaded {
        locations: usize,
        measurements: usize,
    },
}

/// Seed the store from `path` when it holds no measurements yet.
///
/// A missing file is reported, not raised. A malformed file or a failed write
/// is an error, and the write is rolled back as a whole.
pub async fn load_demo_data(loader: &Loader, path: &Path) -> Result<SeedOutcome> {
    // ---
    if loader.get_stats().await?.measurements > 0 {
        info!("Store already populated, skipping demo data");
        return Ok(SeedOutcome::AlreadyPopulated);
    }

    if !path.exists() {
        warn!("Demo data file {} not found", path.display());
        return Ok(SeedOutcome::FileMissing);
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read demo data '{}': {}", path.display(), e))?;
    let data = parse_demo_data(&raw)
        .map_err(|e| anyhow!("Invalid demo data '{}': {}", path.display(), e))?;

    let summary = loader.load_data(&data).await?;
    info!(
        "Demo data loaded: {} cities, {} measurements",
        summary.locations_inserted + summary.locations_updated,
        summary.measurements_inserted
    );

    Ok(SeedOutcome::Loaded {
        locations: summary.locations_inserted + summary.locations_updated,
        measurements: summary.measurements_inserted,
    })
}

fn parse_demo_data(raw: &str) -> Result<Transformed> {
    // ---
    let demo: DemoData = serde_json::from_str(raw)?;

    let measurements = demo
        .measurements
        .into_iter()
        .map(|m| {
            let measurement_date = parse_timestamp(&m.measurement_date)
                .ok_or_else(|| anyhow!("bad measurement_date '{}'", m.measurement_date))?;
            Ok(MeasurementRow {
                city: m.city,
                country: m.country,
                parameter: m.parameter,
                value: m.value,
                unit: m.unit,
                measurement_date,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Transformed {
        locations: demo.locations,
        measurements,
    })
}
