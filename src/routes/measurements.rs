use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::queries::{self, MeasurementFilter};

// ---

pub fn router() -> Router<SqlitePool> {
    // ---
    Router::new().route("/measurements", get(handler))
}

/// `GET /measurements?country=FR,DE&city=Paris&parameter=pm25&limit=100`
async fn handler(
    Query(filter): Query<MeasurementFilter>,
    State(pool): State<SqlitePool>,
) -> impl IntoResponse {
    // ---
    debug!("GET /measurements - {:?}", filter);

    match queries::fetch_measurements(&pool, &filter).await {
        Ok(rows) => {
            debug!("GET /measurements - returning {} rows", rows.len());
            (StatusCode::OK, Json(rows)).into_response()
        }
        Err(e) => {
            error!("Failed to query measurements: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to query measurements"),
            )
                .into_response()
        }
    }
}
