use crate::application::ports::{AuthSession, OperationStore};
use crate::domain::entities::{OperationDraft, PendingOperation};
use crate::domain::value_objects::{
    EntityKind, OperationKind, OperationPayload, RelationKind, SessionUser,
};
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Write-side of the offline queue.
///
/// Offline edits against a record that already has a queued mutation amend
/// that operation's payload instead of enqueueing a second one, so replay
/// sends one request per record. The amend decision and the write are kept
/// atomic with respect to other callers via an internal lock.
pub struct PendingQueue {
    operations: Arc<dyn OperationStore>,
    session: Arc<dyn AuthSession>,
    edit_lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(operations: Arc<dyn OperationStore>, session: Arc<dyn AuthSession>) -> Self {
        Self {
            operations,
            session,
            edit_lock: Mutex::new(()),
        }
    }

    pub fn require_user(&self) -> Result<SessionUser> {
        self.session.current_user().ok_or(AppError::Unauthenticated)
    }

    /// Queue a brand-new record for remote creation.
    pub async fn enqueue_create(
        &self,
        kind: EntityKind,
        entity_id: String,
        payload: OperationPayload,
    ) -> Result<PendingOperation> {
        let user = self.require_user()?;
        let operation = self
            .operations
            .enqueue(OperationDraft::new(
                kind,
                entity_id,
                OperationKind::Create,
                payload,
                user.id,
            ))
            .await?;
        debug!(id = operation.id, kind = %kind, "Queued create");
        Ok(operation)
    }

    /// Fold an edit into the queue. With `allow_amend` an existing queued
    /// mutation for the entity absorbs the patch; otherwise a fresh `update`
    /// is enqueued unconditionally. Returns the operation and whether an
    /// amend happened.
    pub async fn enqueue_or_amend_mutation(
        &self,
        kind: EntityKind,
        entity_id: &str,
        patch: &serde_json::Value,
        allow_amend: bool,
    ) -> Result<(PendingOperation, bool)> {
        let user = self.require_user()?;
        let _guard = self.edit_lock.lock().await;

        if !allow_amend {
            let payload = OperationPayload::new(patch.clone()).map_err(AppError::Validation)?;
            let operation = self
                .operations
                .enqueue(OperationDraft::new(
                    kind,
                    entity_id.to_string(),
                    OperationKind::Update,
                    payload,
                    user.id,
                ))
                .await?;
            debug!(id = operation.id, kind = %kind, "Queued update");
            return Ok((operation, false));
        }

        if let Some(mut existing) = self.operations.find_mutation_for_entity(entity_id).await? {
            existing.payload.deep_merge(patch);
            let now = Utc::now();
            self.operations
                .amend_payload(existing.id, &existing.payload, now)
                .await?;
            debug!(id = existing.id, op = %existing.operation, "Amended queued mutation");
            existing.updated_at = now;
            return Ok((existing, true));
        }

        let payload = OperationPayload::new(patch.clone()).map_err(AppError::Validation)?;
        let operation = self
            .operations
            .enqueue(OperationDraft::new(
                kind,
                entity_id.to_string(),
                OperationKind::Update,
                payload,
                user.id,
            ))
            .await?;
        debug!(id = operation.id, kind = %kind, "Queued update");
        Ok((operation, false))
    }

    /// Same amend-vs-enqueue decision for a relation family. The payload is
    /// replaced, not merged: membership updates are full snapshots.
    pub async fn enqueue_or_amend_relation(
        &self,
        kind: EntityKind,
        relation: RelationKind,
        owner_id: &str,
        payload: OperationPayload,
    ) -> Result<(PendingOperation, bool)> {
        let user = self.require_user()?;
        let _guard = self.edit_lock.lock().await;

        if let Some(mut existing) = self
            .operations
            .find_relation_for_owner(owner_id, relation)
            .await?
        {
            let now = Utc::now();
            self.operations
                .amend_payload(existing.id, &payload, now)
                .await?;
            debug!(id = existing.id, relation = %relation, "Amended queued relation update");
            existing.payload = payload;
            existing.updated_at = now;
            return Ok((existing, true));
        }

        let operation = self
            .operations
            .enqueue(OperationDraft::new(
                kind,
                owner_id.to_string(),
                OperationKind::UpdateRelation(relation),
                payload,
                user.id,
            ))
            .await?;
        debug!(id = operation.id, relation = %relation, "Queued relation update");
        Ok((operation, false))
    }

    pub async fn list_for_current_user(&self) -> Result<Vec<PendingOperation>> {
        let user = self.require_user()?;
        self.operations.list_for_user(&user.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{UserId, UserRole};
    use crate::infrastructure::database::Database;
    use crate::infrastructure::storage::SqliteOperationStore;
    use serde_json::json;

    struct FixedSession(Option<SessionUser>);

    impl AuthSession for FixedSession {
        fn current_user(&self) -> Option<SessionUser> {
            self.0.clone()
        }

        fn bearer_token(&self) -> Option<String> {
            self.0.as_ref().map(|_| "token".to_string())
        }
    }

    fn coordinator() -> SessionUser {
        SessionUser::new(UserId::new("u-1".into()).unwrap(), UserRole::Coordinator)
    }

    async fn setup(user: Option<SessionUser>) -> PendingQueue {
        let pool = Database::in_memory().await.unwrap();
        PendingQueue::new(
            Arc::new(SqliteOperationStore::new(pool)),
            Arc::new(FixedSession(user)),
        )
    }

    #[tokio::test]
    async fn test_enqueue_requires_a_session() {
        let queue = setup(None).await;
        let err = queue
            .enqueue_create(
                EntityKind::Actor,
                "local-1".into(),
                OperationPayload::new(json!({"name": "x"})).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_second_edit_amends_instead_of_enqueueing() {
        let queue = setup(Some(coordinator())).await;
        let created = queue
            .enqueue_create(
                EntityKind::Actor,
                "local-1".into(),
                OperationPayload::new(json!({"name": "Old", "region": "north"})).unwrap(),
            )
            .await
            .unwrap();

        let (amended, was_amend) = queue
            .enqueue_or_amend_mutation(EntityKind::Actor, "local-1", &json!({"name": "New"}), true)
            .await
            .unwrap();

        assert!(was_amend);
        assert_eq!(amended.id, created.id);
        assert_eq!(amended.operation, OperationKind::Create);
        assert_eq!(
            amended.payload.as_json(),
            &json!({"name": "New", "region": "north"})
        );
    }

    #[tokio::test]
    async fn test_edit_without_queued_mutation_enqueues_update() {
        let queue = setup(Some(coordinator())).await;
        let (op, was_amend) = queue
            .enqueue_or_amend_mutation(EntityKind::Actor, "srv-9", &json!({"name": "New"}), true)
            .await
            .unwrap();
        assert!(!was_amend);
        assert_eq!(op.operation, OperationKind::Update);
        assert_eq!(op.entity_id, "srv-9");
    }

    #[tokio::test]
    async fn test_amend_disabled_always_enqueues_fresh_update() {
        let queue = setup(Some(coordinator())).await;
        let created = queue
            .enqueue_create(
                EntityKind::Actor,
                "local-1".into(),
                OperationPayload::new(json!({"name": "Old"})).unwrap(),
            )
            .await
            .unwrap();

        let (op, was_amend) = queue
            .enqueue_or_amend_mutation(EntityKind::Actor, "local-1", &json!({"name": "New"}), false)
            .await
            .unwrap();

        assert!(!was_amend);
        assert_ne!(op.id, created.id);
        assert_eq!(op.operation, OperationKind::Update);
    }

    #[tokio::test]
    async fn test_relation_amend_replaces_payload_wholesale() {
        let queue = setup(Some(coordinator())).await;
        queue
            .enqueue_or_amend_relation(
                EntityKind::Actor,
                RelationKind::OpaProducer,
                "local-1",
                OperationPayload::new(json!({"ownerId": "local-1", "memberIds": ["p1", "p2"]}))
                    .unwrap(),
            )
            .await
            .unwrap();

        let (op, was_amend) = queue
            .enqueue_or_amend_relation(
                EntityKind::Actor,
                RelationKind::OpaProducer,
                "local-1",
                OperationPayload::new(json!({"ownerId": "local-1", "memberIds": ["p3"]}))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(was_amend);
        assert_eq!(op.payload.get_str_array("memberIds"), vec!["p3".to_string()]);
    }

    #[tokio::test]
    async fn test_relation_families_queue_independently() {
        let queue = setup(Some(coordinator())).await;
        let (_, first_amend) = queue
            .enqueue_or_amend_relation(
                EntityKind::Actor,
                RelationKind::OpaProducer,
                "local-1",
                OperationPayload::new(json!({"ownerId": "local-1", "memberIds": ["p1"]}))
                    .unwrap(),
            )
            .await
            .unwrap();
        let (_, second_amend) = queue
            .enqueue_or_amend_relation(
                EntityKind::Actor,
                RelationKind::ExporterBuyer,
                "local-1",
                OperationPayload::new(json!({"ownerId": "local-1", "memberIds": ["b1"]}))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!first_amend);
        assert!(!second_amend);
    }
}
