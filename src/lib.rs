//! Batch ETL pipeline for hourly European air-quality readings.
//!
//! Each run pulls the trailing 24 hours of pollutant readings for a fixed set
//! of cities, validates and normalizes them into `locations` and
//! `measurements`, and merges them into an embedded SQLite store in a single
//! transaction. A small read API serves the stored data to the dashboard.
//!
//! Modules, in pipeline order:
//! - [`extract`]: HTTP fetch and response parsing per city
//! - [`transform`]: validation, normalization, location dedup
//! - [`load`]: transactional upsert/dedup into the store
//! - [`pipeline`]: stage sequencing and run reporting
//!
//! Supporting modules: [`config`], [`db`], [`schema`], [`seed`], [`queries`], [`routes`].

pub mod config;
pub mod db;
pub mod extract;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod queries;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod transform;

pub use config::Config;
pub use extract::Extractor;
pub use load::{LoadSummary, Loader};
pub use pipeline::{Pipeline, PipelineState, RunReport};
