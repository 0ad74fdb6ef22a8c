use crate::application::ports::{ApiClient, EntityStore, OperationStore};
use crate::application::repositories::support::{scrub_for_remote, server_id_of, sync_rows};
use crate::application::services::{IdentityResolver, PendingQueue, SyncHandler};
use crate::domain::entities::{EntityDraft, EntityRecord, PendingOperation};
use crate::domain::value_objects::{
    merge_json, EntityKind, LocalId, OperationKind, OperationPayload, UserRole,
};
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const BASE: &str = "/calendars";

/// Market and pickup event calendars. Same offline-first write path as
/// actors, minus relation handling: calendars carry no many-to-many links.
pub struct CalendarRepository {
    entities: Arc<dyn EntityStore>,
    operations: Arc<dyn OperationStore>,
    queue: Arc<PendingQueue>,
    resolver: IdentityResolver,
    api: Arc<dyn ApiClient>,
}

impl CalendarRepository {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        operations: Arc<dyn OperationStore>,
        queue: Arc<PendingQueue>,
        api: Arc<dyn ApiClient>,
    ) -> Self {
        let resolver = IdentityResolver::new(entities.clone());
        Self {
            entities,
            operations,
            queue,
            resolver,
            api,
        }
    }

    pub async fn get_all(&self, is_online: bool) -> Result<Vec<EntityRecord>> {
        if is_online {
            match self.api.get(BASE).await {
                Ok(data) => {
                    let now = Utc::now();
                    for (server_id, document) in sync_rows(data) {
                        self.entities
                            .upsert_by_server_id(EntityKind::Calendar, &server_id, document, now)
                            .await?;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Calendar list fetch failed, serving local cache");
                }
                Err(e) => return Err(e),
            }
        }
        self.entities.list(EntityKind::Calendar).await
    }

    pub async fn get_by_id(&self, id: &str, is_online: bool) -> Result<Option<EntityRecord>> {
        let record = self
            .entities
            .find_by_either_id(EntityKind::Calendar, id)
            .await?;
        if !is_online {
            return Ok(record);
        }
        let Some(record) = record else {
            return Ok(None);
        };
        let Some(server_id) = &record.server_id else {
            return Ok(Some(record));
        };

        match self.api.get(&format!("{BASE}/{server_id}")).await {
            Ok(document) => {
                self.entities
                    .upsert_by_server_id(EntityKind::Calendar, server_id, document, Utc::now())
                    .await?;
                self.entities
                    .find_by_server_id(EntityKind::Calendar, server_id)
                    .await
            }
            Err(e) if e.is_transient() => {
                warn!(id, error = %e, "Calendar fetch failed, serving local cache");
                Ok(Some(record))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn add(&self, data: Value) -> Result<EntityRecord> {
        if !data.is_object() {
            return Err(AppError::Validation(
                "Calendar document must be a JSON object".to_string(),
            ));
        }
        self.queue.require_user()?;

        let local_id = LocalId::generate();
        let record = self
            .entities
            .insert(EntityDraft::local(
                EntityKind::Calendar,
                local_id.clone(),
                data.clone(),
            ))
            .await?;

        let mut payload_value = data;
        merge_json(
            &mut payload_value,
            &json!({"localId": local_id.as_str()}),
        );
        let payload = OperationPayload::new(payload_value).map_err(AppError::Validation)?;
        self.queue
            .enqueue_create(EntityKind::Calendar, local_id.as_str().to_string(), payload)
            .await?;
        info!(local_id = %local_id, "Calendar created offline");
        Ok(record)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: &Value,
        edit_offline: bool,
    ) -> Result<EntityRecord> {
        if !patch.is_object() {
            return Err(AppError::Validation(
                "Calendar patch must be a JSON object".to_string(),
            ));
        }
        let record = self
            .entities
            .find_by_either_id(EntityKind::Calendar, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("calendar {id}")))?;
        let ref_id = record.reference_id().to_string();

        self.queue
            .enqueue_or_amend_mutation(EntityKind::Calendar, &ref_id, patch, edit_offline)
            .await?;

        let mut merged = record.data.clone();
        merge_json(&mut merged, patch);
        self.entities.patch_data(record.row_id, merged).await?;

        self.entities
            .find_by_either_id(EntityKind::Calendar, &ref_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("calendar {ref_id} vanished during update")))
    }

    /// Online-only, like actor status transitions.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let server_id = self.resolver.require(EntityKind::Calendar, id).await?;
        let response = self
            .api
            .patch(
                &format!("{BASE}/{server_id}/status"),
                &json!({"status": status}),
            )
            .await?;

        if let Some(record) = self
            .entities
            .find_by_server_id(EntityKind::Calendar, &server_id)
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

    pub async fn remove(&self, id: &str) -> Result<()> {
        let record = self
            .entities
            .find_by_either_id(EntityKind::Calendar, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("calendar {id}")))?;

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
        }
        self.entities.delete(record.row_id).await?;
        info!(id, "Calendar removed");
        Ok(())
    }

    async fn replay_create(&self, operation: &PendingOperation) -> Result<()> {
        let record = self
            .entities
            .find_by_either_id(EntityKind::Calendar, &operation.entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("calendar {}", operation.entity_id)))?;
        let body = scrub_for_remote(operation.payload.as_json());

        // Same duplicate guard as actors: an attached server id means the
        // previous attempt landed, so retry as an update.
        let response = match &record.server_id {
            Some(server_id) => self.api.put(&format!("{BASE}/{server_id}"), &body).await?,
            None => self.api.post(BASE, &body).await?,
        };

        if record.server_id.is_none() {
            let server_id = server_id_of(&response)?;
            self.entities
                .attach_server_id(record.row_id, &server_id, Utc::now())
                .await?;
        }
        let mut merged = record.data.clone();
        if response.is_object() {
            merge_json(&mut merged, &response);
        }
        self.entities.patch_data(record.row_id, merged).await?;
        Ok(())
    }

    async fn replay_update(&self, operation: &PendingOperation) -> Result<()> {
        let server_id = self
            .resolver
            .require(EntityKind::Calendar, &operation.entity_id)
            .await?;
        let body = scrub_for_remote(operation.payload.as_json());
        let response = self
            .api
            .put(&format!("{BASE}/{server_id}"), &body)
            .await?;

        if let Some(record) = self
            .entities
            .find_by_server_id(EntityKind::Calendar, &server_id)
            .await?
        {
            let mut merged = record.data.clone();
            let folded = if response.is_object() { response } else { body };
            merge_json(&mut merged, &folded);
            self.entities.patch_data(record.row_id, merged).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SyncHandler for CalendarRepository {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Calendar
    }

    fn allowed_roles(&self) -> &'static [UserRole] {
        &[UserRole::Admin, UserRole::Coordinator, UserRole::FieldAgent]
    }

    async fn handle(&self, operation: &PendingOperation) -> Result<()> {
        match operation.operation {
            OperationKind::Create => self.replay_create(operation).await,
            OperationKind::Update => self.replay_update(operation).await,
            OperationKind::UpdateRelation(relation) => Err(AppError::Internal(format!(
                "calendars carry no {relation} relations"
            ))),
        }
    }

    async fn pull_all(&self) -> Result<u32> {
        let data = self.api.get(&format!("{BASE}/sync/all")).await?;
        let rows = sync_rows(data);
        let count = rows.len() as u32;
        self.entities
            .replace_synced(EntityKind::Calendar, rows, Utc::now())
            .await?;
        info!(count, "Calendar full pull finished");
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
                .upsert_by_server_id(EntityKind::Calendar, server_id, document.clone(), now)
                .await?;
        }
        info!(count = rows.len(), since_ms, "Calendar incremental pull finished");
        Ok(rows.len() as u32)
    }
}
