//! Transform stage: validate raw observations and split them into the
//! `locations` and `measurements` tables.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{
    parse_naive_timestamp, LocationRow, MeasurementRow, ParameterStats, RawObservation, Transformed,
};

// ---

/// Clean and reshape one run's raw observations.
///
/// Rows with a missing, non-finite or negative value, or with a missing or
/// unparseable date, are dropped. Locations are de-duplicated on the exact
/// `(city, country, latitude, longitude)` tuple, keeping first-seen order.
pub fn transform(raw: &[RawObservation]) -> Transformed {
    // ---
    if raw.is_empty() {
        warn!("No observations to transform");
        return Transformed::default();
    }

    info!("Transforming {} raw observations", raw.len());

    let mut seen = HashSet::new();
    let mut out = Transformed::default();
    let mut dropped = 0usize;

    for obs in raw {
        let Some(row) = to_measurement(obs) else {
            dropped += 1;
            continue;
        };

        let key = (
            obs.city.as_str(),
            obs.country.as_str(),
            obs.latitude.to_bits(),
            obs.longitude.to_bits(),
        );
        if seen.insert(key) {
            out.locations.push(LocationRow {
                city: obs.city.clone(),
                country: obs.country.clone(),
                latitude: obs.latitude,
                longitude: obs.longitude,
            });
        }

        out.measurements.push(row);
    }

    if dropped > 0 {
        debug!("Dropped {} invalid observations", dropped);
    }
    info!(
        "Transform complete: {} locations, {} measurements",
        out.locations.len(),
        out.measurements.len()
    );
    out
}

fn to_measurement(obs: &RawObservation) -> Option<MeasurementRow> {
    // ---
    let value = obs.value.filter(|v| v.is_finite() && *v >= 0.0)?;
    let measurement_date = obs.date.as_deref().and_then(parse_timestamp)?;

    Some(MeasurementRow {
        city: obs.city.clone(),
        country: obs.country.clone(),
        parameter: obs.parameter.clone(),
        value,
        unit: obs.unit.clone(),
        measurement_date,
    })
}

/// Normalize a timestamp to UTC. Offset-less stamps are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_timestamp(raw).map(|naive| naive.and_utc())
}

/// Mean/min/max/count per `(city, parameter)`, ordered by city then parameter.
///
/// Diagnostic only; values are rounded to two decimals.
pub fn aggregate_stats(measurements: &[MeasurementRow]) -> Vec<ParameterStats> {
    // ---
    let mut groups: BTreeMap<(&str, &str), (f64, f64, f64, usize)> = BTreeMap::new();

    for m in measurements {
        let entry = groups
            .entry((m.city.as_str(), m.parameter.as_str()))
            .or_insert((0.0, f64::INFINITY, f64::NEG_INFINITY, 0));
        entry.0 += m.value;
        entry.1 = entry.1.min(m.value);
        entry.2 = entry.2.max(m.value);
        entry.3 += 1;
    }

    let mut stats = Vec::with_capacity(groups.len());
    for ((city, parameter), (sum, min, max, count)) in groups {
        stats.push(ParameterStats {
            city: city.to_string(),
            parameter: parameter.to_string(),
            mean: round2(sum / count as f64),
            min: round2(min),
            max: round2(max),
            count,
        });
    }
    stats
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
