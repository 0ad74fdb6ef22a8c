use crate::shared::error::Result;
use sqlx::Executor;

use super::DbPool;

/// Idempotent schema setup for the four local tables.
pub async fn create_all_tables(pool: &DbPool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS entity_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            local_id TEXT,
            server_id TEXT,
            data TEXT NOT NULL,
            sync_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            synced_at INTEGER
        )
        "#,
    )
    .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_entity_records_local ON entity_records(kind, local_id)",
    )
    .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_entity_records_server ON entity_records(kind, server_id)",
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS pending_operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_kind TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            retries INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_attempt_at INTEGER
        )
        "#,
    )
    .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_pending_operations_entity ON pending_operations(entity_id)",
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS relation_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            owner_local_id TEXT,
            owner_server_id TEXT,
            member_local_id TEXT,
            member_server_id TEXT,
            created_at INTEGER NOT NULL,
            synced_at INTEGER
        )
        "#,
    )
    .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_relation_rows_owner
         ON relation_rows(kind, owner_local_id, owner_server_id)",
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS sync_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .await?;

    Ok(())
}
