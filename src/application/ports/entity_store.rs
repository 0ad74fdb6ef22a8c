use crate::domain::entities::{EntityDraft, EntityRecord};
use crate::domain::value_objects::{EntityKind, LocalId, ServerId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Persistent table of cached domain records.
///
/// Lookups for missing keys return `Ok(None)` / empty vectors; only broken
/// storage surfaces as an error.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert(&self, draft: EntityDraft) -> Result<EntityRecord, AppError>;

    /// Match on either identifier without the caller knowing which is set.
    async fn find_by_either_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<EntityRecord>, AppError>;

    async fn find_by_local_id(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
    ) -> Result<Option<EntityRecord>, AppError>;

    async fn find_by_server_id(
        &self,
        kind: EntityKind,
        server_id: &ServerId,
    ) -> Result<Option<EntityRecord>, AppError>;

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, AppError>;

    async fn count(&self, kind: EntityKind) -> Result<i64, AppError>;

    /// Attach the remote identifier after a successful create replay.
    async fn attach_server_id(
        &self,
        row_id: i64,
        server_id: &ServerId,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Replace the record's data document.
    async fn patch_data(&self, row_id: i64, data: Value) -> Result<(), AppError>;

    async fn set_sync_error(&self, row_id: i64, error: Option<String>) -> Result<(), AppError>;

    /// Insert or update a record by server id. Used by incremental pulls;
    /// local-only fields of an existing row (local id, creation time) survive.
    async fn upsert_by_server_id(
        &self,
        kind: EntityKind,
        server_id: &ServerId,
        data: Value,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Full-pull repopulation: drop every synced row of this kind and insert
    /// the fetched collection, leaving still-unsynced local-only rows alone.
    async fn replace_synced(
        &self,
        kind: EntityKind,
        fetched: Vec<(ServerId, Value)>,
        synced_at: DateTime<Utc>,
    ) -> Result<u32, AppError>;

    async fn delete(&self, row_id: i64) -> Result<(), AppError>;

    async fn clear(&self, kind: EntityKind) -> Result<(), AppError>;

    async fn clear_all(&self) -> Result<(), AppError>;
}
