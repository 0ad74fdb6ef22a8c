use crate::application::ports::EntityStore;
use crate::domain::entities::{EntityDraft, EntityRecord};
use crate::domain::value_objects::{EntityKind, LocalId, ServerId};
use crate::infrastructure::database::DbPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::mappers::entity_record_from_row;
use super::rows::EntityRecordRow;

pub struct SqliteEntityStore {
    pool: DbPool,
}

impl SqliteEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_row_id(&self, row_id: i64) -> Result<EntityRecord, AppError> {
        let row = sqlx::query_as::<_, EntityRecordRow>(
            "SELECT * FROM entity_records WHERE id = ?1",
        )
        .bind(row_id)
        .fetch_one(&self.pool)
        .await?;
        entity_record_from_row(row)
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn insert(&self, draft: EntityDraft) -> Result<EntityRecord, AppError> {
        let now = Utc::now().timestamp_millis();
        let data = serde_json::to_string(&draft.data)?;

        let result = sqlx::query(
            r#"
            INSERT INTO entity_records (
                kind, local_id, server_id, data, created_at, updated_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)
            "#,
        )
        .bind(draft.kind.as_str())
        .bind(draft.local_id.as_ref().map(LocalId::as_str))
        .bind(draft.server_id.as_ref().map(ServerId::as_str))
        .bind(&data)
        .bind(now)
        .bind(draft.synced_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        self.fetch_by_row_id(result.last_insert_rowid()).await
    }

    async fn find_by_either_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<EntityRecord>, AppError> {
        let row = sqlx::query_as::<_, EntityRecordRow>(
            r#"
            SELECT * FROM entity_records
            WHERE kind = ?1 AND (local_id = ?2 OR server_id = ?2)
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(entity_record_from_row).transpose()
    }

    async fn find_by_local_id(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
    ) -> Result<Option<EntityRecord>, AppError> {
        let row = sqlx::query_as::<_, EntityRecordRow>(
            "SELECT * FROM entity_records WHERE kind = ?1 AND local_id = ?2 LIMIT 1",
        )
        .bind(kind.as_str())
        .bind(local_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(entity_record_from_row).transpose()
    }

    async fn find_by_server_id(
        &self,
        kind: EntityKind,
        server_id: &ServerId,
    ) -> Result<Option<EntityRecord>, AppError> {
        let row = sqlx::query_as::<_, EntityRecordRow>(
            "SELECT * FROM entity_records WHERE kind = ?1 AND server_id = ?2 LIMIT 1",
        )
        .bind(kind.as_str())
        .bind(server_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(entity_record_from_row).transpose()
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, AppError> {
        let rows = sqlx::query_as::<_, EntityRecordRow>(
            "SELECT * FROM entity_records WHERE kind = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entity_record_from_row).collect()
    }

    async fn count(&self, kind: EntityKind) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entity_records WHERE kind = ?1")
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn attach_server_id(
        &self,
        row_id: i64,
        server_id: &ServerId,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE entity_records
            SET server_id = ?1, synced_at = ?2, updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(server_id.as_str())
        .bind(synced_at.timestamp_millis())
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn patch_data(&self, row_id: i64, data: Value) -> Result<(), AppError> {
        let serialized = serde_json::to_string(&data)?;
        sqlx::query("UPDATE entity_records SET data = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&serialized)
            .bind(Utc::now().timestamp_millis())
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_sync_error(&self, row_id: i64, error: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE entity_records SET sync_error = ?1 WHERE id = ?2")
            .bind(&error)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_by_server_id(
        &self,
        kind: EntityKind,
        server_id: &ServerId,
        data: Value,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let serialized = serde_json::to_string(&data)?;
        let millis = synced_at.timestamp_millis();

        let existing = self.find_by_server_id(kind, server_id).await?;
        match existing {
            Some(record) => {
                sqlx::query(
                    r#"
                    UPDATE entity_records
                    SET data = ?1, updated_at = ?2, synced_at = ?2, sync_error = NULL
                    WHERE id = ?3
                    "#,
                )
                .bind(&serialized)
                .bind(millis)
                .bind(record.row_id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO entity_records (
                        kind, server_id, data, created_at, updated_at, synced_at
                    ) VALUES (?1, ?2, ?3, ?4, ?4, ?4)
                    "#,
                )
                .bind(kind.as_str())
                .bind(server_id.as_str())
                .bind(&serialized)
                .bind(millis)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn replace_synced(
        &self,
        kind: EntityKind,
        fetched: Vec<(ServerId, Value)>,
        synced_at: DateTime<Utc>,
    ) -> Result<u32, AppError> {
        let millis = synced_at.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        // Local-only rows (no server id yet) survive a full pull.
        sqlx::query("DELETE FROM entity_records WHERE kind = ?1 AND server_id IS NOT NULL")
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u32;
        for (server_id, data) in &fetched {
            let serialized = serde_json::to_string(data)?;
            sqlx::query(
                r#"
                INSERT INTO entity_records (
                    kind, server_id, data, created_at, updated_at, synced_at
                ) VALUES (?1, ?2, ?3, ?4, ?4, ?4)
                "#,
            )
            .bind(kind.as_str())
            .bind(server_id.as_str())
            .bind(&serialized)
            .bind(millis)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete(&self, row_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM entity_records WHERE id = ?1")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self, kind: EntityKind) -> Result<(), AppError> {
        sqlx::query("DELETE FROM entity_records WHERE kind = ?1")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM entity_records")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;
    use serde_json::json;

    async fn setup_store() -> SqliteEntityStore {
        let pool = Database::in_memory().await.unwrap();
        SqliteEntityStore::new(pool)
    }

    #[tokio::test]
    async fn test_lookup_by_either_id_matches_both_sides() {
        let store = setup_store().await;
        let local_id = LocalId::generate();
        let record = store
            .insert(EntityDraft::local(
                EntityKind::Actor,
                local_id.clone(),
                json!({"name": "Coop du Nord"}),
            ))
            .await
            .unwrap();

        let server_id = ServerId::new("srv-77".into()).unwrap();
        store
            .attach_server_id(record.row_id, &server_id, Utc::now())
            .await
            .unwrap();

        let by_local = store
            .find_by_either_id(EntityKind::Actor, local_id.as_str())
            .await
            .unwrap()
            .unwrap();
        let by_server = store
            .find_by_either_id(EntityKind::Actor, "srv-77")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(by_local.row_id, by_server.row_id);
        assert_eq!(by_local.local_id, Some(local_id));
        assert_eq!(by_local.server_id, Some(server_id));
    }

    #[tokio::test]
    async fn test_missing_lookup_returns_none() {
        let store = setup_store().await;
        let found = store
            .find_by_either_id(EntityKind::Calendar, "nope")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_replace_synced_preserves_local_only_rows() {
        let store = setup_store().await;
        store
            .insert(EntityDraft::local(
                EntityKind::Actor,
                LocalId::generate(),
                json!({"name": "offline only"}),
            ))
            .await
            .unwrap();
        store
            .insert(EntityDraft::synced(
                EntityKind::Actor,
                ServerId::new("old-1".into()).unwrap(),
                json!({"name": "stale"}),
                Utc::now(),
            ))
            .await
            .unwrap();

        let fetched = vec![
            (ServerId::new("a-1".into()).unwrap(), json!({"name": "A1"})),
            (ServerId::new("a-2".into()).unwrap(), json!({"name": "A2"})),
        ];
        let inserted = store
            .replace_synced(EntityKind::Actor, fetched, Utc::now())
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let all = store.list(EntityKind::Actor).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|r| r.server_id.is_none()).count(), 1);
        assert!(store
            .find_by_server_id(EntityKind::Actor, &ServerId::new("old-1".into()).unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_upsert_by_server_id_updates_in_place() {
        let store = setup_store().await;
        let server_id = ServerId::new("cal-9".into()).unwrap();
        store
            .upsert_by_server_id(
                EntityKind::Calendar,
                &server_id,
                json!({"title": "market day"}),
                Utc::now(),
            )
            .await
            .unwrap();
        store
            .upsert_by_server_id(
                EntityKind::Calendar,
                &server_id,
                json!({"title": "market day (moved)"}),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(store.count(EntityKind::Calendar).await.unwrap(), 1);
        let record = store
            .find_by_server_id(EntityKind::Calendar, &server_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.data["title"], "market day (moved)");
    }
}
