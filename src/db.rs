//! Connection factory for the embedded SQLite store.
//!
//! Components never hold a connection beyond one operation: they borrow the
//! pool, acquire what they need (a single query or one transaction) and let
//! it go when the operation ends.

use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

// ---

/// Open a connection pool for `db_url`, creating the database file (and its
/// parent directory) when it does not exist yet.
///
/// Foreign keys are enforced on every connection. In-memory URLs
/// (`sqlite::memory:`) keep their connections alive for the pool's lifetime,
/// since the database disappears with its last connection.
pub async fn connect(db_url: &str, max_connections: u32) -> Result<SqlitePool> {
    // ---
    let options = SqliteConnectOptions::from_str(db_url)
        .map_err(|e| anyhow!("Invalid database URL '{}': {}", db_url, e))?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = db_url.contains(":memory:");
    if !in_memory {
        ensure_parent_dir(options.get_filename())?;
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
    if in_memory {
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| anyhow!("Failed to open database '{}': {}", db_url, e))?;

    tracing::debug!("Opened database pool for {}", db_url);
    Ok(pool)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    // ---
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create data dir '{}': {}", dir.display(), e))?;
            tracing::info!("Created data directory {}", dir.display());
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_missing_directory() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("air_quality.db");
        let url = format!("sqlite://{}", db_path.display());

        let pool = connect(&url, 1).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        pool.close().await;

        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        // ---
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        let query = sqlx::query_scalar("SELECT 1");
        let one: i64 = query.fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
