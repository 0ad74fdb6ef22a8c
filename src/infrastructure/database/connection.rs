use crate::shared::error::{AppError, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tracing::info;

pub type DbPool = Pool<Sqlite>;

pub struct Database;

impl Database {
    /// Open (creating if needed) the persistent local store and make sure the
    /// schema exists.
    pub async fn initialize(database_url: &str) -> Result<DbPool> {
        let file_path = database_url
            .trim_start_matches("sqlite://")
            .split('?')
            .next()
            .unwrap_or_default();
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Database(format!("cannot create database dir: {e}")))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        info!("Local store connected: {}", database_url);

        super::schema::create_all_tables(&pool).await?;

        Ok(pool)
    }

    /// Private in-memory store. A single pooled connection keeps the
    /// database alive and isolated per pool, which is what tests need.
    pub async fn in_memory() -> Result<DbPool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        super::schema::create_all_tables(&pool).await?;
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initialize_creates_schema_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("agrosync.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = Database::initialize(&db_url).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = Database::in_memory().await.unwrap();
        create_all_tables_twice(&pool).await;
    }

    async fn create_all_tables_twice(pool: &DbPool) {
        crate::infrastructure::database::create_all_tables(pool)
            .await
            .unwrap();
        crate::infrastructure::database::create_all_tables(pool)
            .await
            .unwrap();
    }
}
