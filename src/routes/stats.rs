use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::config::parse_countries;
use crate::queries::{self, DEFAULT_RANKING_LIMIT};

// ---

pub fn router() -> Router<SqlitePool> {
    // ---
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/rankings", get(rankings_handler))
}

/// `GET /stats` - dashboard header totals.
async fn stats_handler(State(pool): State<SqlitePool>) -> impl IntoResponse {
    // ---
    match queries::dashboard_stats(&pool).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!("Failed to compute stats: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to compute stats"),
            )
                .into_response()
        }
    }
}

/// Query parameters for the city ranking
#[derive(Debug, Deserialize)]
struct RankingQuery {
    parameter: Option<String>,
    /// Comma-separated country codes
    country: Option<String>,
    limit: Option<u32>,
}

/// `GET /rankings?parameter=pm25&country=FR,DE&limit=10` - cities by mean value.
async fn rankings_handler(
    Query(params): Query<RankingQuery>,
    State(pool): State<SqlitePool>,
) -> impl IntoResponse {
    // ---
    debug!("GET /rankings - {:?}", params);

    let parameter = params.parameter.as_deref().unwrap_or("pm25");
    let countries = params
        .country
        .as_deref()
        .map(parse_countries)
        .unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_RANKING_LIMIT);

    match queries::city_rankings(&pool, parameter, &countries, limit).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => {
            error!("Failed to rank cities: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json("Failed to rank cities")).into_response()
        }
    }
}
