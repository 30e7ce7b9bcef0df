//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use airquality_etl::{db, schema, Config, Extractor, Loader, Pipeline};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PATH: &str = "/v1/air-quality";

pub async fn memory_pool() -> SqlitePool {
    // ---
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    schema::create_schema(&pool).await.unwrap();
    pool
}

pub fn config_for(server: &MockServer) -> Config {
    // ---
    Config {
        api_url: format!("{}{}", server.uri(), API_PATH),
        api_timeout_secs: 1,
        ..Config::default()
    }
}

pub fn pipeline_for(server: &MockServer, pool: &SqlitePool) -> Pipeline {
    // ---
    let extractor = Extractor::new(&config_for(server)).unwrap();
    Pipeline::new(extractor, Loader::new(pool.clone()))
}

/// An Open-Meteo style body with pm2_5 and pm10 series.
pub fn hourly_body(
    lat: f64,
    lon: f64,
    times: &[&str],
    pm25: &[Option<f64>],
    pm10: &[Option<f64>],
) -> Value {
    // ---
    json!({
        "latitude": lat,
        "longitude": lon,
        "utc_offset_seconds": 0,
        "hourly": {
            "time": times,
            "pm2_5": pm25,
            "pm10": pm10,
        }
    })
}

/// Answer requests carrying `latitude` with `template`.
pub async fn mock_city(server: &MockServer, latitude: &str, template: ResponseTemplate) {
    // ---
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("latitude", latitude))
        .respond_with(template)
        .mount(server)
        .await;
}

pub const TIMES: [&str; 3] = ["2024-01-01T00:00", "2024-01-01T01:00", "2024-01-01T02:00"];

/// Paris and Lyon, three hours of pm2_5 and pm10 each: 12 observations.
pub async fn mock_paris_and_lyon(server: &MockServer) {
    // ---
    mock_city(
        server,
        "48.8566",
        ResponseTemplate::new(200).set_body_json(hourly_body(
            48.86,
            2.34,
            &TIMES,
            &[Some(10.0), Some(11.0), Some(12.0)],
            &[Some(20.0), Some(21.0), Some(22.0)],
        )),
    )
    .await;

    mock_city(
        server,
        "45.764",
        ResponseTemplate::new(200).set_body_json(hourly_body(
            45.76,
            4.84,
            &TIMES,
            &[Some(5.0), Some(6.0), Some(7.0)],
            &[Some(15.0), Some(16.0), Some(17.0)],
        )),
    )
    .await;
}
