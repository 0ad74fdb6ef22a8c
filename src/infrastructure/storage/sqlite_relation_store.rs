use crate::application::ports::RelationStore;
use crate::domain::entities::{RelationEnd, RelationRow};
use crate::domain::value_objects::{LocalId, RelationKind, ServerId};
use crate::infrastructure::database::DbPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::mappers::relation_row_from_row;
use super::rows::RelationLinkRow;

pub struct SqliteRelationStore {
    pool: DbPool,
}

impl SqliteRelationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationStore for SqliteRelationStore {
    async fn replace_for_owner(
        &self,
        kind: RelationKind,
        owner: &RelationEnd,
        members: &[RelationEnd],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let millis = now.timestamp_millis();
        let owner_local = owner.local_id.as_ref().map(LocalId::as_str);
        let owner_server = owner.server_id.as_ref().map(ServerId::as_str);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM relation_rows
            WHERE kind = ?1 AND (owner_local_id = ?2 OR owner_server_id = ?3)
            "#,
        )
        .bind(kind.as_str())
        .bind(owner_local)
        .bind(owner_server)
        .execute(&mut *tx)
        .await?;

        for member in members {
            sqlx::query(
                r#"
                INSERT INTO relation_rows (
                    kind, owner_local_id, owner_server_id,
                    member_local_id, member_server_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(kind.as_str())
            .bind(owner_local)
            .bind(owner_server)
            .bind(member.local_id.as_ref().map(LocalId::as_str))
            .bind(member.server_id.as_ref().map(ServerId::as_str))
            .bind(millis)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_owner(
        &self,
        kind: RelationKind,
        owner_id: &str,
    ) -> Result<Vec<RelationRow>, AppError> {
        let rows = sqlx::query_as::<_, RelationLinkRow>(
            r#"
            SELECT * FROM relation_rows
            WHERE kind = ?1 AND (owner_local_id = ?2 OR owner_server_id = ?2)
            ORDER BY id ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(relation_row_from_row).collect()
    }

    async fn rekey_owner(
        &self,
        kind: RelationKind,
        local_id: &LocalId,
        server_id: &ServerId,
    ) -> Result<u32, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE relation_rows
            SET owner_server_id = ?1
            WHERE kind = ?2 AND owner_local_id = ?3
            "#,
        )
        .bind(server_id.as_str())
        .bind(kind.as_str())
        .bind(local_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn rekey_member(
        &self,
        kind: RelationKind,
        local_id: &LocalId,
        server_id: &ServerId,
    ) -> Result<u32, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE relation_rows
            SET member_server_id = ?1
            WHERE kind = ?2 AND member_local_id = ?3
            "#,
        )
        .bind(server_id.as_str())
        .bind(kind.as_str())
        .bind(local_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn mark_synced_for_owner(
        &self,
        kind: RelationKind,
        owner_id: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE relation_rows
            SET synced_at = ?1
            WHERE kind = ?2 AND (owner_local_id = ?3 OR owner_server_id = ?3)
            "#,
        )
        .bind(synced_at.timestamp_millis())
        .bind(kind.as_str())
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_for_owner(&self, kind: RelationKind, owner_id: &str) -> Result<u32, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM relation_rows
            WHERE kind = ?1 AND (owner_local_id = ?2 OR owner_server_id = ?2)
            "#,
        )
        .bind(kind.as_str())
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM relation_rows")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
