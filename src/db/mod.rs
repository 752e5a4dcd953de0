/// Database layer for the back office
///
/// Manages the SQLite pool holding admin users, sessions and the audit log.

use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Create a SQLite connection pool
pub async fn create_pool(storage: &StorageConfig) -> AppResult<SqlitePool> {
    let in_memory = storage.database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(&storage.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_secs(5));

    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    // Every connection to `:memory:` is its own database, so pin the pool to
    // one connection that never expires.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(storage.max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_keeps_schema() {
        let storage = StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 4,
        };
        let pool = create_pool(&storage).await.unwrap();
        run_migrations(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();

        // A second checkout must see the tables created by the first
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_audit_log")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_closed_pool_reports_error() {
        let storage = StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        let pool = create_pool(&storage).await.unwrap();
        pool.close().await;
        assert!(matches!(
            test_connection(&pool).await,
            Err(AppError::Database(_))
        ));
    }
}
