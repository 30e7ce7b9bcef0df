//! Configuration loader for the `airquality-etl` pipeline.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Keeping every `env::var` call here means the
//! pipeline stages only ever see a typed [`Config`].
//!
use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable, falling back to a default.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| $default.to_string())
    };
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/air_quality.db";
pub const DEFAULT_API_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
pub const DEFAULT_COUNTRIES: &str = "FR,DE,ES,IT,BE,NL,CH";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Air-quality API endpoint.
    pub api_url: String,

    /// Per-city request timeout, in seconds.
    pub api_timeout_secs: u64,

    /// Timezone sent with every request (`auto` lets the API pick the city's zone).
    pub api_timezone: String,

    /// Country codes monitored by a default run.
    pub countries: Vec<String>,

    /// Result-count hint passed to the extractor.
    pub limit: u32,

    /// JSON file used to seed an empty store.
    pub demo_data_path: PathBuf,

    /// Port for the read API.
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Self {
            db_url: DEFAULT_DATABASE_URL.to_string(),
            db_pool_max: 5,
            api_url: DEFAULT_API_URL.to_string(),
            api_timeout_secs: 10,
            api_timezone: "auto".to_string(),
            countries: parse_countries(DEFAULT_COUNTRIES),
            limit: 50,
            demo_data_path: PathBuf::from("demo_data.json"),
            server_port: 8080,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – SQLite connection string (default: `sqlite://data/air_quality.db`)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `AIR_QUALITY_API_URL` – air-quality endpoint (default: Open-Meteo)
/// - `API_TIMEOUT_SECS` – per-city request timeout (default: 10)
/// - `API_TIMEZONE` – timezone query parameter (default: `auto`)
/// - `PIPELINE_COUNTRIES` – comma-separated country codes (default: `FR,DE,ES,IT,BE,NL,CH`)
/// - `PIPELINE_LIMIT` – result-count hint (default: 50)
/// - `DEMO_DATA_PATH` – demo seed file (default: `demo_data.json`)
/// - `SERVER_PORT` – read API port (default: 8080)
///
/// Returns an error if any numeric variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = env_or!("DATABASE_URL", DEFAULT_DATABASE_URL);
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let api_url = env_or!("AIR_QUALITY_API_URL", DEFAULT_API_URL);
    let api_timeout_secs = parse_env!("API_TIMEOUT_SECS", u64, 10);
    let api_timezone = env_or!("API_TIMEZONE", "auto");
    let countries = parse_countries(&env_or!("PIPELINE_COUNTRIES", DEFAULT_COUNTRIES));
    let limit = parse_env!("PIPELINE_LIMIT", u32, 50);
    let demo_data_path = PathBuf::from(env_or!("DEMO_DATA_PATH", "demo_data.json"));
    let server_port = parse_env!("SERVER_PORT", u16, 8080);

    if db_pool_max == 0 {
        return Err(anyhow!("Invalid DB_POOL_MAX: must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        api_url,
        api_timeout_secs,
        api_timezone,
        countries,
        limit,
        demo_data_path,
        server_port,
    })
}

/// Split a comma-separated list of country codes, upper-casing and dropping blanks.
pub fn parse_countries(raw: &str) -> Vec<String> {
    // ---
    raw.split(',')
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", self.db_url);
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!("  AIR_QUALITY_API_URL : {}", self.api_url);
        tracing::info!("  API_TIMEOUT_SECS    : {}", self.api_timeout_secs);
        tracing::info!("  API_TIMEZONE        : {}", self.api_timezone);
        tracing::info!("  PIPELINE_COUNTRIES  : {}", self.countries.join(","));
        tracing::info!("  PIPELINE_LIMIT      : {}", self.limit);
        tracing::info!("  DEMO_DATA_PATH      : {}", self.demo_data_path.display());
        tracing::info!("  SERVER_PORT         : {}", self.server_port);
    }
}
