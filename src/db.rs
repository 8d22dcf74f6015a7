//! SQLite connection setup and the embedded schema migration.

use anyhow::Result;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr};

const INIT_MIGRATION: &str = include_str!("../migrations/0001_init.sql");

/// Open a pool for `database_url`, creating the file and its parent
/// directory when missing. Foreign keys are enforced on every connection.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() && !db_path.contains(":memory:") {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run the schema migration statement by statement.
///
/// Every statement is idempotent, so running it twice is harmless.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_MIGRATION
        .split(';')
        .map(strip_comments)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(&stmt).execute(db).await?;
    }

    Ok(())
}

fn strip_comments(chunk: &str) -> String {
    chunk
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid memory url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("open in-memory sqlite");
    run_migrations(&pool).await.expect("apply schema");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migration_seeds_public_photos_bucket() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.expect("second run is a no-op");

        let (name, public): (String, bool) =
            sqlx::query_as("SELECT name, public FROM buckets")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "photos");
        assert!(public);
    }

    #[test]
    fn comment_lines_are_dropped() {
        assert_eq!(strip_comments("-- note\nSELECT 1"), "SELECT 1");
        assert_eq!(strip_comments("\n  -- only a comment\n"), "");
    }
}
