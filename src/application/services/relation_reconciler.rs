use crate::application::ports::{EntityStore, RelationStore};
use crate::application::services::PendingQueue;
use crate::domain::entities::{PendingOperation, RelationEnd};
use crate::domain::value_objects::{EntityKind, OperationPayload, RelationKind, ServerId};
use crate::shared::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Keeps the local join tables and the relation queue in step.
///
/// Membership is full-replacement: callers hand over the complete desired
/// member list and the previous rows for that owner and family are dropped.
pub struct RelationReconciler {
    entities: Arc<dyn EntityStore>,
    relations: Arc<dyn RelationStore>,
    queue: Arc<PendingQueue>,
}

impl RelationReconciler {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        relations: Arc<dyn RelationStore>,
        queue: Arc<PendingQueue>,
    ) -> Self {
        Self {
            entities,
            relations,
            queue,
        }
    }

    /// Record the desired member set for an owner: rewrite the local rows and
    /// queue (or amend) the matching relation operation. Member ids with no
    /// cached record are dropped with a warning rather than failing the edit.
    ///
    /// Returns `None` when the desired set matches the cached rows already.
    pub async fn set_members(
        &self,
        relation: RelationKind,
        owner_id: &str,
        member_ids: &[String],
    ) -> Result<Option<PendingOperation>> {
        let owner = self
            .entities
            .find_by_either_id(EntityKind::Actor, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor {owner_id}")))?;

        let mut ends = Vec::with_capacity(member_ids.len());
        let mut kept = Vec::with_capacity(member_ids.len());
        for member_id in member_ids {
            match self
                .entities
                .find_by_either_id(EntityKind::Actor, member_id)
                .await?
            {
                Some(record) => {
                    kept.push(record.reference_id().to_string());
                    ends.push(RelationEnd::from_record(&record));
                }
                None => {
                    warn!(%relation, member = %member_id, "Unknown member dropped from relation update");
                }
            }
        }

        // Both sides of the comparison use the canonical reference (server id
        // once known), so a local alias of a synced member is not a change.
        let current = self.relations.list_for_owner(relation, owner_id).await?;
        let current_ids: BTreeSet<String> = current
            .iter()
            .map(|row| reference_of(&row.member))
            .collect();
        let desired_ids: BTreeSet<String> = kept.iter().cloned().collect();
        if current_ids == desired_ids {
            debug!(%relation, owner = owner_id, "Member set unchanged, nothing to queue");
            return Ok(None);
        }

        let owner_end = RelationEnd::from_record(&owner);
        self.relations
            .replace_for_owner(relation, &owner_end, &ends, Utc::now())
            .await?;

        let payload = OperationPayload::new(json!({
            "ownerId": owner.reference_id(),
            "memberIds": kept,
        }))
        .map_err(AppError::Validation)?;
        let (operation, _) = self
            .queue
            .enqueue_or_amend_relation(EntityKind::Actor, relation, owner.reference_id(), payload)
            .await?;
        Ok(Some(operation))
    }

    /// Mirror a membership list the server confirmed. Ends are keyed by
    /// server id; local ids are kept for members still cached locally.
    pub async fn apply_confirmed_members(
        &self,
        relation: RelationKind,
        owner: &RelationEnd,
        confirmed: &[ServerId],
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut ends = Vec::with_capacity(confirmed.len());
        for server_id in confirmed {
            let end = match self
                .entities
                .find_by_server_id(EntityKind::Actor, server_id)
                .await?
            {
                Some(record) => RelationEnd::from_record(&record),
                None => RelationEnd::server(server_id.clone()),
            };
            ends.push(end);
        }

        let owner_id = reference_of(owner);
        self.relations
            .replace_for_owner(relation, owner, &ends, synced_at)
            .await?;
        self.relations
            .mark_synced_for_owner(relation, &owner_id, synced_at)
            .await?;
        Ok(())
    }

    pub async fn members_for(
        &self,
        relation: RelationKind,
        owner_id: &str,
    ) -> Result<Vec<crate::domain::entities::RelationRow>> {
        self.relations.list_for_owner(relation, owner_id).await
    }
}

fn reference_of(end: &RelationEnd) -> String {
    end.server_id
        .as_ref()
        .map(|id| id.as_str().to_string())
        .or_else(|| end.local_id.as_ref().map(|id| id.as_str().to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AuthSession, OperationStore};
    use crate::domain::entities::EntityDraft;
    use crate::domain::value_objects::{LocalId, SessionUser, UserId, UserRole};
    use crate::infrastructure::database::Database;
    use crate::infrastructure::storage::{
        SqliteEntityStore, SqliteOperationStore, SqliteRelationStore,
    };

    struct FixedSession;

    impl AuthSession for FixedSession {
        fn current_user(&self) -> Option<SessionUser> {
            Some(SessionUser::new(
                UserId::new("u-1".into()).unwrap(),
                UserRole::Coordinator,
            ))
        }

        fn bearer_token(&self) -> Option<String> {
            Some("token".into())
        }
    }

    struct Fixture {
        reconciler: RelationReconciler,
        entities: Arc<dyn EntityStore>,
        relations: Arc<dyn RelationStore>,
        operations: Arc<dyn OperationStore>,
    }

    async fn setup() -> Fixture {
        let pool = Database::in_memory().await.unwrap();
        let entities: Arc<dyn EntityStore> = Arc::new(SqliteEntityStore::new(pool.clone()));
        let relations: Arc<dyn RelationStore> = Arc::new(SqliteRelationStore::new(pool.clone()));
        let operations: Arc<dyn OperationStore> = Arc::new(SqliteOperationStore::new(pool));
        let queue = Arc::new(PendingQueue::new(operations.clone(), Arc::new(FixedSession)));
        Fixture {
            reconciler: RelationReconciler::new(entities.clone(), relations.clone(), queue),
            entities,
            relations,
            operations,
        }
    }

    async fn insert_local(fx: &Fixture, data: serde_json::Value) -> LocalId {
        let local_id = LocalId::generate();
        fx.entities
            .insert(EntityDraft::local(
                EntityKind::Actor,
                local_id.clone(),
                data,
            ))
            .await
            .unwrap();
        local_id
    }

    #[tokio::test]
    async fn test_set_members_replaces_rows_and_queues_one_operation() {
        let fx = setup().await;
        let opa = insert_local(&fx, json!({"name": "OPA"})).await;
        let p1 = insert_local(&fx, json!({"name": "P1"})).await;
        let p2 = insert_local(&fx, json!({"name": "P2"})).await;

        let op = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string(), p2.as_str().to_string()],
            )
            .await
            .unwrap()
            .expect("operation queued");
        assert_eq!(
            op.payload.get_str_array("memberIds"),
            vec![p1.as_str().to_string(), p2.as_str().to_string()]
        );

        let rows = fx
            .relations
            .list_for_owner(RelationKind::OpaProducer, opa.as_str())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        // Second edit amends the same operation and fully replaces the rows.
        let p3 = insert_local(&fx, json!({"name": "P3"})).await;
        let amended = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p3.as_str().to_string()],
            )
            .await
            .unwrap()
            .expect("operation queued");
        assert_eq!(amended.id, op.id);
        let rows = fx
            .relations
            .list_for_owner(RelationKind::OpaProducer, opa.as_str())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_members_are_dropped_with_the_rest_kept() {
        let fx = setup().await;
        let opa = insert_local(&fx, json!({"name": "OPA"})).await;
        let p1 = insert_local(&fx, json!({"name": "P1"})).await;

        let op = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string(), "ghost".to_string()],
            )
            .await
            .unwrap()
            .expect("operation queued");

        assert_eq!(
            op.payload.get_str_array("memberIds"),
            vec![p1.as_str().to_string()]
        );
        let rows = fx
            .relations
            .list_for_owner(RelationKind::OpaProducer, opa.as_str())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_member_set_queues_nothing() {
        let fx = setup().await;
        let opa = insert_local(&fx, json!({"name": "OPA"})).await;
        let p1 = insert_local(&fx, json!({"name": "P1"})).await;

        fx.reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string()],
            )
            .await
            .unwrap();
        let second = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string()],
            )
            .await
            .unwrap();
        assert!(second.is_none());

        let queued = fx
            .operations
            .find_relation_for_owner(opa.as_str(), RelationKind::OpaProducer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queued.payload.get_str_array("memberIds").len(), 1);
    }

    #[tokio::test]
    async fn test_local_alias_of_synced_member_is_not_a_change() {
        let fx = setup().await;
        let opa = insert_local(&fx, json!({"name": "OPA"})).await;
        let p1 = insert_local(&fx, json!({"name": "P1"})).await;
        let p1_record = fx
            .entities
            .find_by_local_id(EntityKind::Actor, &p1)
            .await
            .unwrap()
            .unwrap();
        fx.entities
            .attach_server_id(
                p1_record.row_id,
                &ServerId::new("srv-p1".into()).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();

        let first = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string()],
            )
            .await
            .unwrap()
            .expect("operation queued");
        // Rows and payload are keyed by the server id already.
        assert_eq!(
            first.payload.get_str_array("memberIds"),
            vec!["srv-p1".to_string()]
        );

        let second = fx
            .reconciler
            .set_members(
                RelationKind::OpaProducer,
                opa.as_str(),
                &[p1.as_str().to_string()],
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_missing_owner_is_not_found() {
        let fx = setup().await;
        let err = fx
            .reconciler
            .set_members(RelationKind::OpaProducer, "ghost", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_confirmed_members_mirror_server_state() {
        let fx = setup().await;
        let opa = insert_local(&fx, json!({"name": "OPA"})).await;
        let owner = RelationEnd::new(Some(opa.clone()), None).unwrap();

        let known = insert_local(&fx, json!({"name": "P1"})).await;
        let known_record = fx
            .entities
            .find_by_local_id(EntityKind::Actor, &known)
            .await
            .unwrap()
            .unwrap();
        fx.entities
            .attach_server_id(
                known_record.row_id,
                &ServerId::new("srv-p1".into()).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();

        fx.reconciler
            .apply_confirmed_members(
                RelationKind::OpaProducer,
                &owner,
                &[
                    ServerId::new("srv-p1".into()).unwrap(),
                    ServerId::new("srv-p9".into()).unwrap(),
                ],
                Utc::now(),
            )
            .await
            .unwrap();

        let rows = fx
            .relations
            .list_for_owner(RelationKind::OpaProducer, opa.as_str())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.synced_at.is_some()));
        // The member cached locally keeps its local id alongside the server id.
        let cached = rows
            .iter()
            .find(|row| row.member.server_id.as_ref().map(ServerId::as_str) == Some("srv-p1"))
            .unwrap();
        assert!(cached.member.local_id.is_some());
    }
}
