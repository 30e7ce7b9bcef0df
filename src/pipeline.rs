//! Pipeline orchestrator: Extract → Transform → Load.
//!
//! A run moves through `Extracting → Transforming → Loading → Done`, or stops
//! in `Failed` as soon as a stage produces nothing or the load errors. The
//! caller only ever gets a [`RunReport`]; no stage error escapes as `Err`.
//! Runs are never retried here; scheduling and re-invocation belong to the caller.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::extract::Extractor;
use crate::load::{LoadSummary, Loader};
use crate::models::StoreStats;
use crate::transform;

// ---

/// Where a run is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    // ---
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    // ---
    pub state: PipelineState,
    /// Stage that was running when the run failed.
    pub failed_at: Option<PipelineState>,
    pub error: Option<String>,
    pub extracted: usize,
    pub locations: usize,
    pub measurements: usize,
    pub load: Option<LoadSummary>,
    pub store: Option<StoreStats>,
    pub elapsed: Duration,
}

impl RunReport {
    fn new() -> Self {
        // ---
        Self {
            state: PipelineState::Extracting,
            failed_at: None,
            error: None,
            extracted: 0,
            locations: 0,
            measurements: 0,
            load: None,
            store: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    fn fail(mut self, error: impl Into<String>, started: Instant) -> Self {
        // ---
        self.failed_at = Some(self.state);
        self.state = PipelineState::Failed;
        self.error = Some(error.into());
        self.elapsed = started.elapsed();
        self
    }
}

/// Wires the three stages together.
#[derive(Debug, Clone)]
pub struct Pipeline {
    // ---
    extractor: Extractor,
    loader: Loader,
}

impl Pipeline {
    // ---
    pub fn new(extractor: Extractor, loader: Loader) -> Self {
        Self { extractor, loader }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Execute one full run for `countries`.
    #[tracing::instrument(name = "pipeline_run", skip_all, fields(countries = %countries.join(",")))]
    pub async fn run(&self, countries: &[String], limit: u32) -> RunReport {
        // ---
        let started = Instant::now();
        let mut report = RunReport::new();
        info!("Starting ETL pipeline");

        // Step 1: Extract
        info!("[1/3] Extracting observations from the air-quality API");
        let stage = Instant::now();
        let raw = self
            .extractor
            .extract_latest_measurements(countries, limit)
            .await;
        report.extracted = raw.len();

        if raw.is_empty() {
            error!("No observations extracted, stopping pipeline");
            return report.fail("extract produced no observations", started);
        }
        info!(
            "Extracted {} observations in {:?}",
            raw.len(),
            stage.elapsed()
        );

        // Step 2: Transform
        report.state = PipelineState::Transforming;
        info!("[2/3] Transforming and cleaning observations");
        let stage = Instant::now();
        let transformed = transform::transform(&raw);
        report.locations = transformed.locations.len();
        report.measurements = transformed.measurements.len();

        if transformed.locations.is_empty() || transformed.measurements.is_empty() {
            error!("No valid data after transform, stopping pipeline");
            return report.fail("transform produced an empty table", started);
        }

        let groups = transform::aggregate_stats(&transformed.measurements);
        info!(
            "Transformed in {:?}: {} unique locations, {} valid measurements, {} city/parameter groups",
            stage.elapsed(),
            report.locations,
            report.measurements,
            groups.len()
        );

        // Step 3: Load
        report.state = PipelineState::Loading;
        info!("[3/3] Loading into the store");
        let stage = Instant::now();
        match self.loader.load_data(&transformed).await {
            Ok(summary) => {
                info!("Loaded in {:?}", stage.elapsed());
                report.load = Some(summary);
            }
            Err(e) => {
                error!("Pipeline failed during load: {:#}", e);
                return report.fail(format!("{:#}", e), started);
            }
        }

        report.state = PipelineState::Done;
        report.elapsed = started.elapsed();

        match self.loader.get_stats().await {
            Ok(stats) => {
                info!("Pipeline finished successfully in {:?}", report.elapsed);
                info!("  Total locations    : {}", stats.locations);
                info!("  Total measurements : {}", stats.measurements);
                match stats.last_measurement {
                    Some(last) => info!("  Last measurement   : {}", last),
                    None => info!("  Last measurement   : none"),
                }
                report.store = Some(stats);
            }
            Err(e) => warn!("Pipeline finished but store stats are unavailable: {:#}", e),
        }

        report
    }
}
