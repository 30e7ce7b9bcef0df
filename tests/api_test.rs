mod common;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use wiremock::MockServer;

use airquality_etl::routes;
use common::*;

#[derive(Debug, Deserialize)]
struct MeasurementView {
    city: String,
    country: String,
    parameter: String,
    value: f64,
    measurement_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Stats {
    total_measurements: i64,
    total_cities: i64,
    total_countries: i64,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CityAverage {
    city: String,
    average: f64,
    samples: i64,
}

/// Run the pipeline against the mock API, then serve the store on an ephemeral port.
async fn serve_loaded_store() -> Result<String> {
    // ---
    let upstream = MockServer::start().await;
    mock_paris_and_lyon(&upstream).await;
    let pool = memory_pool().await;

    let report = pipeline_for(&upstream, &pool)
        .run(&["FR".to_string()], 50)
        .await;
    assert!(report.succeeded());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, routes::router(pool)).await.ok();
    });

    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn measurements_endpoint_returns_newest_first() -> Result<()> {
    // ---
    let base = serve_loaded_store().await?;
    let client = Client::new();

    let rows: Vec<MeasurementView> = client
        .get(format!("{}/measurements", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(rows.len(), 12);
    assert!(rows
        .windows(2)
        .all(|w| w[0].measurement_date >= w[1].measurement_date));
    assert!(rows.iter().all(|r| r.country == "FR" && r.value >= 0.0));

    Ok(())
}

#[tokio::test]
async fn filtering_works() -> Result<()> {
    // ---
    let base = serve_loaded_store().await?;
    let client = Client::new();

    let url = format!("{}/measurements?city=Lyon&parameter=pm10&limit=2", base);
    let rows: Vec<MeasurementView> = client.get(&url).send().await?.json().await?;

    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.city, "Lyon", "City filter failed");
        assert_eq!(row.parameter, "pm10", "Parameter filter failed");
    }
    assert_eq!(rows[0].value, 17.0);

    let url = format!("{}/measurements?country=DE", base);
    let rows: Vec<MeasurementView> = client.get(&url).send().await?.json().await?;
    assert!(rows.is_empty());

    Ok(())
}

#[tokio::test]
async fn stats_and_rankings() -> Result<()> {
    // ---
    let base = serve_loaded_store().await?;
    let client = Client::new();

    let stats: Stats = client
        .get(format!("{}/stats", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats.total_measurements, 12);
    assert_eq!(stats.total_cities, 2);
    assert_eq!(stats.total_countries, 1);
    assert_eq!(
        stats.last_update.map(|d| d.to_rfc3339()),
        Some("2024-01-01T02:00:00+00:00".to_string())
    );

    let ranking: Vec<CityAverage> = client
        .get(format!("{}/rankings?parameter=pm25", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].city, "Paris");
    assert_eq!(ranking[0].average, 11.0);
    assert_eq!(ranking[0].samples, 3);

    let health = client.get(format!("{}/health", base)).send().await?;
    assert!(health.status().is_success());

    Ok(())
}
