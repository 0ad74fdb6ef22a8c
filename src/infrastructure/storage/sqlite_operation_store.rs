use crate::application::ports::{DuePolicy, OperationStore};
use crate::domain::entities::{OperationDraft, PendingOperation};
use crate::domain::value_objects::{OperationKind, OperationPayload, RelationKind, UserId};
use crate::infrastructure::database::DbPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::mappers::pending_operation_from_row;
use super::rows::PendingOperationRow;

pub struct SqliteOperationStore {
    pool: DbPool,
}

impl SqliteOperationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i64) -> Result<PendingOperation, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(
            "SELECT * FROM pending_operations WHERE id = ?1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        pending_operation_from_row(row)
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    async fn enqueue(&self, draft: OperationDraft) -> Result<PendingOperation, AppError> {
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::to_string(draft.payload.as_json())?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_operations (
                entity_kind, entity_id, operation, payload, user_id,
                status, retries, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?6)
            "#,
        )
        .bind(draft.entity_kind.as_str())
        .bind(&draft.entity_id)
        .bind(draft.operation.as_str())
        .bind(&payload)
        .bind(draft.user_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch(result.last_insert_rowid()).await
    }

    async fn get(&self, id: i64) -> Result<Option<PendingOperation>, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(
            "SELECT * FROM pending_operations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(pending_operation_from_row).transpose()
    }

    async fn find_mutation_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Option<PendingOperation>, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(
            r#"
            SELECT * FROM pending_operations
            WHERE entity_id = ?1 AND operation IN ('create', 'update')
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(pending_operation_from_row).transpose()
    }

    async fn find_relation_for_owner(
        &self,
        entity_id: &str,
        relation: RelationKind,
    ) -> Result<Option<PendingOperation>, AppError> {
        let operation = OperationKind::UpdateRelation(relation);
        let row = sqlx::query_as::<_, PendingOperationRow>(
            r#"
            SELECT * FROM pending_operations
            WHERE entity_id = ?1 AND operation = ?2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .bind(operation.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(pending_operation_from_row).transpose()
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        policy: DuePolicy,
    ) -> Result<Vec<PendingOperation>, AppError> {
        let rows = sqlx::query_as::<_, PendingOperationRow>(
            r#"
            SELECT * FROM pending_operations
            WHERE status IN ('pending', 'failed')
              AND retries <= ?1
              AND (last_attempt_at IS NULL OR last_attempt_at + (?2 * retries) <= ?3)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(policy.max_retries as i64)
        .bind(policy.backoff_ms)
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(pending_operation_from_row).collect()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<PendingOperation>, AppError> {
        let rows = sqlx::query_as::<_, PendingOperationRow>(
            r#"
            SELECT * FROM pending_operations
            WHERE user_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(pending_operation_from_row).collect()
    }

    async fn amend_payload(
        &self,
        id: i64,
        payload: &OperationPayload,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let serialized = serde_json::to_string(payload.as_json())?;
        sqlx::query(
            r#"
            UPDATE pending_operations
            SET payload = ?1, status = 'pending', updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(&serialized)
        .bind(now.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_in_flight(&self, id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pending_operations
            SET status = 'in_flight', last_attempt_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_in_flight(&self) -> Result<u32, AppError> {
        let result =
            sqlx::query("UPDATE pending_operations SET status = 'pending' WHERE status = 'in_flight'")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn mark_pending(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE pending_operations SET status = 'pending' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pending_operations
            SET status = 'failed', retries = retries + 1,
                error_message = ?1, last_attempt_at = ?2, updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(error)
        .bind(now.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM pending_operations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_for_entity(&self, entity_id: &str) -> Result<u32, AppError> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE entity_id = ?1")
            .bind(entity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM pending_operations")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
