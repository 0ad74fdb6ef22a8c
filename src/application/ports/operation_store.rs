use crate::domain::entities::{OperationDraft, PendingOperation};
use crate::domain::value_objects::{OperationPayload, RelationKind, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Retry gating applied when listing due operations.
#[derive(Debug, Clone, Copy)]
pub struct DuePolicy {
    pub max_retries: u32,
    pub backoff_ms: i64,
}

/// Ordered, persisted queue of mutation intents.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn enqueue(&self, draft: OperationDraft) -> Result<PendingOperation, AppError>;

    async fn get(&self, id: i64) -> Result<Option<PendingOperation>, AppError>;

    /// Latest queued `create`/`update` for an entity, used for the
    /// amend-vs-enqueue decision on offline edits.
    async fn find_mutation_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Option<PendingOperation>, AppError>;

    /// Queued relation operation of one family for an owner entity.
    async fn find_relation_for_owner(
        &self,
        entity_id: &str,
        relation: RelationKind,
    ) -> Result<Option<PendingOperation>, AppError>;

    /// Operations ready for replay, FIFO by enqueue time. Excludes items
    /// past `max_retries` and items still inside their backoff window.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        policy: DuePolicy,
    ) -> Result<Vec<PendingOperation>, AppError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<PendingOperation>, AppError>;

    /// Overwrite the payload after a deep merge, bump `updated_at`, and put
    /// the item back in `Pending` so an edited failure is retried. The retry
    /// counter is left untouched.
    async fn amend_payload(
        &self,
        id: i64,
        payload: &OperationPayload,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn mark_in_flight(&self, id: i64, now: DateTime<Utc>) -> Result<(), AppError>;

    /// Put every `InFlight` item back to `Pending`. Run before a drain so
    /// items stranded mid-replay by a crash or kill re-enter the due list.
    async fn release_in_flight(&self) -> Result<u32, AppError>;

    /// Put an in-flight item back to `Pending` without touching retries
    /// (used when a dependency was not ready yet).
    async fn mark_pending(&self, id: i64) -> Result<(), AppError>;

    /// Record a failed replay: retries + 1, error message, `Failed` status.
    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Called only after the remote replay succeeded.
    async fn remove(&self, id: i64) -> Result<(), AppError>;

    async fn remove_for_entity(&self, entity_id: &str) -> Result<u32, AppError>;

    async fn clear_all(&self) -> Result<(), AppError>;
}
