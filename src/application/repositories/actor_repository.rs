use crate::application::ports::{ApiClient, EntityStore, OperationStore, RelationStore};
use crate::application::repositories::support::{
    confirmed_members_in, member_ids_in, scrub_for_remote, server_id_of, sync_rows,
};
use crate::application::services::{
    IdentityResolver, PendingQueue, RelationReconciler, Resolution, SyncHandler,
};
use crate::domain::entities::{EntityDraft, EntityRecord, PendingOperation, RelationEnd};
use crate::domain::value_objects::{
    merge_json, EntityKind, LocalId, OperationKind, OperationPayload, RelationKind, ServerId,
    UserRole,
};
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BASE: &str = "/actors";

/// Actor writes are offline-first: `add`, `update`, and member edits complete
/// once the optimistic row and the queued operation are stored, and the sync
/// engine replays them through this repository's `SyncHandler` impl.
///
/// Producers, OPA groups, and exporter networks are all actors; the
/// cooperative and mandate links between them live in the relation tables.
pub struct ActorRepository {
    entities: Arc<dyn EntityStore>,
    relations: Arc<dyn RelationStore>,
    operations: Arc<dyn OperationStore>,
    queue: Arc<PendingQueue>,
    reconciler: Arc<RelationReconciler>,
    resolver: IdentityResolver,
    api: Arc<dyn ApiClient>,
}

impl ActorRepository {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        relations: Arc<dyn RelationStore>,
        operations: Arc<dyn OperationStore>,
        queue: Arc<PendingQueue>,
        reconciler: Arc<RelationReconciler>,
        api: Arc<dyn ApiClient>,
    ) -> Self {
        let resolver = IdentityResolver::new(entities.clone());
        Self {
            entities,
            relations,
            operations,
            queue,
            reconciler,
            resolver,
            api,
        }
    }

    /// Online: refresh the cache from the remote collection, then serve from
    /// it. Offline (or when the remote is unreachable): serve the cache.
    pub async fn get_all(&self, is_online: bool) -> Result<Vec<EntityRecord>> {
        if is_online {
            match self.api.get(BASE).await {
                Ok(data) => {
                    let now = Utc::now();
                    for (server_id, document) in sync_rows(data) {
                        self.entities
                            .upsert_by_server_id(EntityKind::Actor, &server_id, document, now)
                            .await?;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Actor list fetch failed, serving local cache");
                }
                Err(e) => return Err(e),
            }
        }
        self.entities.list(EntityKind::Actor).await
    }

    pub async fn get_by_id(&self, id: &str, is_online: bool) -> Result<Option<EntityRecord>> {
        let record = self.entities.find_by_either_id(EntityKind::Actor, id).await?;
        if !is_online {
            return Ok(record);
        }
        let Some(record) = record else {
            return Ok(None);
        };
        let Some(server_id) = &record.server_id else {
            // Local-only records have nothing to fetch.
            return Ok(Some(record));
        };

        match self.api.get(&format!("{BASE}/{server_id}")).await {
            Ok(document) => {
                self.entities
                    .upsert_by_server_id(EntityKind::Actor, server_id, document, Utc::now())
                    .await?;
                self.entities
                    .find_by_server_id(EntityKind::Actor, server_id)
                    .await
            }
            Err(e) if e.is_transient() => {
                warn!(id, error = %e, "Actor fetch failed, serving local cache");
                Ok(Some(record))
            }
            Err(e) => Err(e),
        }
    }

    /// Create an actor. Member arrays in `data` become optimistic relation
    /// rows and ride inside the queued `create` payload; no separate relation
    /// operation is enqueued.
    pub async fn add(&self, data: Value) -> Result<EntityRecord> {
        if !data.is_object() {
            return Err(AppError::Validation(
                "Actor document must be a JSON object".to_string(),
            ));
        }
        self.queue.require_user()?;

        let local_id = LocalId::generate();
        let record = self
            .entities
            .insert(EntityDraft::local(
                EntityKind::Actor,
                local_id.clone(),
                data.clone(),
            ))
            .await?;

        let mut payload_value = data.clone();
        merge_json(
            &mut payload_value,
            &json!({"localId": local_id.as_str()}),
        );

        let owner_end = RelationEnd::from_record(&record);
        let now = Utc::now();
        for relation in RelationKind::ALL {
            let Some(member_ids) = member_ids_in(&data, relation) else {
                continue;
            };
            let (ends, kept) = self.cached_member_ends(&member_ids, relation).await?;
            self.relations
                .replace_for_owner(relation, &owner_end, &ends, now)
                .await?;
            let entries: Vec<Value> = kept
                .iter()
                .map(|id| json!({relation.member_id_field(): id}))
                .collect();
            merge_json(
                &mut payload_value,
                &json!({relation.payload_field(): entries}),
            );
        }

        let payload = OperationPayload::new(payload_value).map_err(AppError::Validation)?;
        self.queue
            .enqueue_create(EntityKind::Actor, local_id.as_str().to_string(), payload)
            .await?;
        info!(local_id = %local_id, "Actor created offline");
        Ok(record)
    }

    /// Patch an actor. With `edit_offline`, a still-queued mutation for the
    /// record absorbs the patch; otherwise a fresh `update` is enqueued.
    /// Member arrays in the patch go through the relation reconciler unless
    /// they can ride inside a queued `create`.
    pub async fn update(
        &self,
        id: &str,
        patch: &Value,
        edit_offline: bool,
    ) -> Result<EntityRecord> {
        if !patch.is_object() {
            return Err(AppError::Validation(
                "Actor patch must be a JSON object".to_string(),
            ));
        }
        let record = self
            .entities
            .find_by_either_id(EntityKind::Actor, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor {id}")))?;
        let ref_id = record.reference_id().to_string();

        let mut doc_patch = patch.clone();
        let mut member_sets = Vec::new();
        for relation in RelationKind::ALL {
            if let Some(ids) = member_ids_in(patch, relation) {
                member_sets.push((relation, ids));
                if let Some(map) = doc_patch.as_object_mut() {
                    map.remove(relation.payload_field());
                }
            }
        }

        let queued_create = if edit_offline {
            self.operations
                .find_mutation_for_entity(&ref_id)
                .await?
                .filter(|op| op.operation == OperationKind::Create)
        } else {
            None
        };

        if let Some(create) = queued_create {
            // Members ride inside the create payload, mirroring `add`.
            let mut rider = doc_patch.clone();
            let owner_end = RelationEnd::from_record(&record);
            let now = Utc::now();
            for (relation, ids) in &member_sets {
                let (ends, kept) = self.cached_member_ends(ids, *relation).await?;
                self.relations
                    .replace_for_owner(*relation, &owner_end, &ends, now)
                    .await?;
                let entries: Vec<Value> = kept
                    .iter()
                    .map(|id| json!({relation.member_id_field(): id}))
                    .collect();
                merge_json(&mut rider, &json!({relation.payload_field(): entries}));
            }
            let (_, amended) = self
                .queue
                .enqueue_or_amend_mutation(EntityKind::Actor, &ref_id, &rider, true)
                .await?;
            debug!(id = %ref_id, amended, create_id = create.id, "Offline edit folded into queued create");
        } else {
            let has_doc_changes = doc_patch
                .as_object()
                .is_some_and(|map| !map.is_empty());
            if has_doc_changes {
                self.queue
                    .enqueue_or_amend_mutation(EntityKind::Actor, &ref_id, &doc_patch, edit_offline)
                    .await?;
            }
            for (relation, ids) in &member_sets {
                self.reconciler.set_members(*relation, &ref_id, ids).await?;
            }
        }

        let mut merged = record.data.clone();
        merge_json(&mut merged, patch);
        self.entities.patch_data(record.row_id, merged).await?;

        self.entities
            .find_by_either_id(EntityKind::Actor, &ref_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("actor {ref_id} vanished during update")))
    }

    /// Replace one relation family's member set for an owner actor.
    pub async fn set_members(
        &self,
        relation: RelationKind,
        owner_id: &str,
        member_ids: &[String],
    ) -> Result<()> {
        self.queue.require_user()?;
        self.reconciler
            .set_members(relation, owner_id, member_ids)
            .await?;
        Ok(())
    }

    /// Status transitions need server-side authority and are never queued;
    /// an unsynced actor cannot change status yet.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let server_id = self.resolver.require(EntityKind::Actor, id).await?;
        let response = self
            .api
            .patch(
                &format!("{BASE}/{server_id}/status"),
                &json!({"status": status}),
            )
            .await?;

        if let Some(record) = self
            .entities
            .find_by_server_id(EntityKind::Actor, &server_id)
            .await?
        {
            let mut merged = record.data.clone();
            let folded = if response.is_object() {
                response
            } else {
                json!({"status": status})
            };
            merge_json(&mut merged, &folded);
            self.entities.patch_data(record.row_id, merged).await?;
        }
        Ok(())
    }

    /// Delete an actor. Synced records are removed remotely first; a
    /// local-only record is a discarded offline edit and is wiped wholesale
    /// together with its queued operations and relation rows.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let record = self
            .entities
            .find_by_either_id(EntityKind::Actor, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor {id}")))?;

        if let Some(server_id) = &record.server_id {
            self.api.delete(&format!("{BASE}/{server_id}")).await?;
        }

        for entity_id in [
            record.local_id.as_ref().map(|l| l.as_str().to_string()),
            record.server_id.as_ref().map(|s| s.as_str().to_string()),
        ]
        .into_iter()
        .flatten()
        {
            self.operations.remove_for_entity(&entity_id).await?;
            for relation in RelationKind::ALL {
                self.relations.delete_for_owner(relation, &entity_id).await?;
            }
        }
        self.entities.delete(record.row_id).await?;
        info!(id, "Actor removed");
        Ok(())
    }

    /// Relation ends for member ids that are cached locally. Ids with no
    /// cached record are dropped with a warning, never sent as-is.
    async fn cached_member_ends(
        &self,
        member_ids: &[String],
        relation: RelationKind,
    ) -> Result<(Vec<RelationEnd>, Vec<String>)> {
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
                    warn!(%relation, member = %member_id, "Unknown member dropped");
                }
            }
        }
        Ok((ends, kept))
    }

    /// Map member ids to server ids for an outbound call. Members that have
    /// not synced yet are skipped with a warning; the remote API never sees
    /// a local id.
    async fn resolved_server_ids(&self, member_ids: &[String]) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(member_ids.len());
        for member_id in member_ids {
            match self.resolver.resolve(EntityKind::Actor, member_id).await? {
                Resolution::Server(server_id) => resolved.push(server_id.as_str().to_string()),
                Resolution::Pending(local_id) => {
                    warn!(member = %local_id, "Member not synced yet, left out of remote call");
                }
                Resolution::Unknown => {
                    warn!(member = %member_id, "Unknown member left out of remote call");
                }
            }
        }
        Ok(resolved)
    }

    async fn outbound_create_body(&self, payload: &OperationPayload) -> Result<Value> {
        let data = payload.as_json();
        let mut body = scrub_for_remote(data);
        for relation in RelationKind::ALL {
            if let Some(member_ids) = member_ids_in(data, relation) {
                let resolved = self.resolved_server_ids(&member_ids).await?;
                merge_json(&mut body, &json!({relation.confirmed_field(): resolved}));
            }
        }
        Ok(body)
    }

    async fn replay_create(&self, operation: &PendingOperation) -> Result<()> {
        let record = self
            .entities
            .find_by_either_id(EntityKind::Actor, &operation.entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor {}", operation.entity_id)))?;
        let body = self.outbound_create_body(&operation.payload).await?;

        // A server id on the record means an earlier attempt reached the
        // server and only the response was lost; retrying the POST would
        // create a duplicate, so the replay degrades to an update.
        let response = match &record.server_id {
            Some(server_id) => self.api.put(&format!("{BASE}/{server_id}"), &body).await?,
            None => self.api.post(BASE, &body).await?,
        };

        let now = Utc::now();
        let server_id = match &record.server_id {
            Some(server_id) => server_id.clone(),
            None => {
                let server_id = server_id_of(&response)?;
                self.entities
                    .attach_server_id(record.row_id, &server_id, now)
                    .await?;
                if let Some(local_id) = &record.local_id {
                    for relation in RelationKind::ALL {
                        self.relations
                            .rekey_owner(relation, local_id, &server_id)
                            .await?;
                        self.relations
                            .rekey_member(relation, local_id, &server_id)
                            .await?;
                    }
                }
                server_id
            }
        };

        let mut merged = record.data.clone();
        if response.is_object() {
            merge_json(&mut merged, &response);
        }
        self.entities.patch_data(record.row_id, merged).await?;

        let owner_end = RelationEnd {
            local_id: record.local_id.clone(),
            server_id: Some(server_id.clone()),
        };
        for relation in RelationKind::ALL {
            if let Some(confirmed) = confirmed_members_in(&response, relation) {
                self.reconciler
                    .apply_confirmed_members(relation, &owner_end, &confirmed, now)
                    .await?;
            }
        }
        info!(%server_id, "Actor create replayed");
        Ok(())
    }

    async fn replay_update(&self, operation: &PendingOperation) -> Result<()> {
        let server_id = self
            .resolver
            .require(EntityKind::Actor, &operation.entity_id)
            .await?;
        let body = scrub_for_remote(operation.payload.as_json());
        let response = self
            .api
            .put(&format!("{BASE}/{server_id}"), &body)
            .await?;

        if let Some(record) = self
            .entities
            .find_by_server_id(EntityKind::Actor, &server_id)
            .await?
        {
            let mut merged = record.data.clone();
            let folded = if response.is_object() { response } else { body };
            merge_json(&mut merged, &folded);
            self.entities.patch_data(record.row_id, merged).await?;
        }
        Ok(())
    }

    async fn replay_relation(
        &self,
        operation: &PendingOperation,
        relation: RelationKind,
    ) -> Result<()> {
        let owner_ref = operation
            .payload
            .get_str("ownerId")
            .unwrap_or(&operation.entity_id)
            .to_string();
        let owner_id = self.resolver.require(EntityKind::Actor, &owner_ref).await?;

        let member_ids = operation.payload.get_str_array("memberIds");
        let resolved = self.resolved_server_ids(&member_ids).await?;
        let response = self
            .api
            .post(
                &format!("{BASE}/{owner_id}/{}", relation.segment()),
                &json!({"memberIds": resolved}),
            )
            .await?;

        // Prefer the membership the server confirms; fall back to what was
        // sent when the response carries no list.
        let confirmed: Vec<ServerId> = confirmed_members_in(&response, relation)
            .or_else(|| {
                response.get("memberIds").and_then(Value::as_array).map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|raw| ServerId::new(raw.to_string()).ok())
                        .collect()
                })
            })
            .unwrap_or_else(|| {
                resolved
                    .iter()
                    .filter_map(|raw| ServerId::new(raw.clone()).ok())
                    .collect()
            });

        let owner_end = match self
            .entities
            .find_by_server_id(EntityKind::Actor, &owner_id)
            .await?
        {
            Some(record) => RelationEnd::from_record(&record),
            None => RelationEnd::server(owner_id.clone()),
        };
        self.reconciler
            .apply_confirmed_members(relation, &owner_end, &confirmed, Utc::now())
            .await?;
        Ok(())
    }

    async fn apply_pulled_documents(&self, rows: &[(ServerId, Value)]) -> Result<()> {
        let now = Utc::now();
        for (server_id, document) in rows {
            for relation in RelationKind::ALL {
                let Some(confirmed) = confirmed_members_in(document, relation) else {
                    continue;
                };
                let owner_end = match self
                    .entities
                    .find_by_server_id(EntityKind::Actor, server_id)
                    .await?
                {
                    Some(record) => RelationEnd::from_record(&record),
                    None => RelationEnd::server(server_id.clone()),
                };
                self.reconciler
                    .apply_confirmed_members(relation, &owner_end, &confirmed, now)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SyncHandler for ActorRepository {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Actor
    }

    fn allowed_roles(&self) -> &'static [UserRole] {
        &[UserRole::Admin, UserRole::Coordinator]
    }

    async fn handle(&self, operation: &PendingOperation) -> Result<()> {
        match operation.operation {
            OperationKind::Create => self.replay_create(operation).await,
            OperationKind::Update => self.replay_update(operation).await,
            OperationKind::UpdateRelation(relation) => {
                self.replay_relation(operation, relation).await
            }
        }
    }

    async fn pull_all(&self) -> Result<u32> {
        let data = self.api.get(&format!("{BASE}/sync/all")).await?;
        let rows = sync_rows(data);
        let count = rows.len() as u32;
        self.entities
            .replace_synced(EntityKind::Actor, rows.clone(), Utc::now())
            .await?;
        self.apply_pulled_documents(&rows).await?;
        info!(count, "Actor full pull finished");
        Ok(count)
    }

    async fn pull_updates(&self, since_ms: i64) -> Result<u32> {
        let data = self
            .api
            .get(&format!("{BASE}/sync/updates?since={since_ms}"))
            .await?;
        let rows = sync_rows(data);
        let now = Utc::now();
        for (server_id, document) in &rows {
            self.entities
                .upsert_by_server_id(EntityKind::Actor, server_id, document.clone(), now)
                .await?;
        }
        self.apply_pulled_documents(&rows).await?;
        info!(count = rows.len(), since_ms, "Actor incremental pull finished");
        Ok(rows.len() as u32)
    }
}
