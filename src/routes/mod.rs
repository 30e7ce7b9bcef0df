use axum::Router;
use sqlx::SqlitePool;

mod health;
mod measurements;
mod stats;

// ---

/// Read-only API consumed by the dashboard.
pub fn router(pool: SqlitePool) -> Router {
    // ---
    Router::new()
        .merge(measurements::router())
        .merge(stats::router())
        .merge(health::router())
        .with_state(pool)
}
