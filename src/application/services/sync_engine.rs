use crate::application::ports::{
    AuthSession, DeltaTracker, DuePolicy, EntityStore, OperationStore, SettingsStore,
};
use crate::domain::entities::{PendingOperation, SyncReport};
use crate::domain::value_objects::{EntityKind, SessionUser, UserRole};
use crate::shared::config::SyncConfig;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Per-kind replay and pull strategy, implemented by the domain repositories.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    fn entity_kind(&self) -> EntityKind;

    /// Roles allowed to pull and replay this kind. Other roles skip the
    /// pull and leave queued operations of this kind untouched.
    fn allowed_roles(&self) -> &'static [UserRole];

    /// Replay one queued operation against the remote API.
    async fn handle(&self, operation: &PendingOperation) -> Result<()>;

    /// Fetch the whole remote collection into the local store. Returns the
    /// number of records written.
    async fn pull_all(&self) -> Result<u32>;

    /// Fetch records changed since the given epoch-millis watermark.
    async fn pull_updates(&self, since_ms: i64) -> Result<u32>;
}

/// Drains the pending queue and keeps the local cache current.
///
/// Concurrent triggers coalesce: while one drain is running, further calls
/// return immediately with `already_running` set instead of queueing up.
pub struct SyncEngine {
    operations: Arc<dyn OperationStore>,
    entities: Arc<dyn EntityStore>,
    settings: Arc<dyn SettingsStore>,
    deltas: Arc<dyn DeltaTracker>,
    session: Arc<dyn AuthSession>,
    handlers: Vec<Arc<dyn SyncHandler>>,
    config: SyncConfig,
    is_syncing: Arc<RwLock<bool>>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operations: Arc<dyn OperationStore>,
        entities: Arc<dyn EntityStore>,
        settings: Arc<dyn SettingsStore>,
        deltas: Arc<dyn DeltaTracker>,
        session: Arc<dyn AuthSession>,
        handlers: Vec<Arc<dyn SyncHandler>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            operations,
            entities,
            settings,
            deltas,
            session,
            handlers,
            config,
            is_syncing: Arc::new(RwLock::new(false)),
        }
    }

    fn handler_for(&self, kind: EntityKind) -> Option<&Arc<dyn SyncHandler>> {
        self.handlers.iter().find(|h| h.entity_kind() == kind)
    }

    fn require_user(&self) -> Result<SessionUser> {
        self.session.current_user().ok_or(AppError::Unauthenticated)
    }

    fn since_key(kind: EntityKind) -> String {
        format!("sync:since:{}", kind.as_str())
    }

    /// Replay every due operation, FIFO. Returns the run counters, or an
    /// error when the session died mid-run.
    pub async fn trigger_sync(&self) -> Result<SyncReport> {
        {
            let mut flag = self.is_syncing.write().await;
            if *flag {
                debug!("Sync already in progress, coalescing trigger");
                return Ok(SyncReport::already_running());
            }
            *flag = true;
        }

        let result = self.drain().await;
        *self.is_syncing.write().await = false;
        result
    }

    /// Login-time reconciliation: per-kind pull (full, incremental, or
    /// skipped depending on local state and delta counts), then a drain.
    pub async fn sync_on_login(&self) -> Result<SyncReport> {
        let user = self.require_user()?;
        let mut report = SyncReport::default();

        for handler in &self.handlers {
            let kind = handler.entity_kind();
            if !handler.allowed_roles().contains(&user.role) {
                debug!(%kind, role = %user.role, "Role not in pull allow-list, skipping");
                continue;
            }
            match self.pull_kind(handler.as_ref(), kind).await {
                Ok(pulled) => report.pulled += pulled,
                Err(e) if e.is_transient() => {
                    warn!(%kind, error = %e, "Pull failed, keeping local cache");
                }
                Err(e) => return Err(e),
            }
        }

        let drained = self.trigger_sync().await?;
        report.merge(&drained);
        report.already_running = drained.already_running;
        Ok(report)
    }

    async fn pull_kind(&self, handler: &dyn SyncHandler, kind: EntityKind) -> Result<u32> {
        let key = Self::since_key(kind);
        let since = self
            .settings
            .get(&key)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok());
        let cached = self.entities.count(kind).await?;

        let pulled = match since {
            Some(_) if cached == 0 => {
                info!(%kind, "Local cache empty, full pull");
                handler.pull_all().await?
            }
            Some(since_ms) => {
                let delta = self.deltas.get_count(kind);
                if delta == 0 {
                    debug!(%kind, "No remote changes reported, skipping pull");
                    return Ok(0);
                }
                info!(%kind, delta, since_ms, "Incremental pull");
                handler.pull_updates(since_ms).await?
            }
            None => {
                info!(%kind, "No sync watermark yet, full pull");
                handler.pull_all().await?
            }
        };

        self.settings
            .set(&key, &Utc::now().timestamp_millis().to_string())
            .await?;
        self.deltas.set_count(kind, 0);
        Ok(pulled)
    }

    async fn drain(&self) -> Result<SyncReport> {
        let user = self.require_user()?;
        let mut report = SyncReport::default();

        // Items left in flight by a crashed run go back to pending first so
        // they show up as due again.
        let released = self.operations.release_in_flight().await?;
        if released > 0 {
            warn!(released, "Requeued operations stranded in flight by an interrupted run");
        }

        let policy = DuePolicy {
            max_retries: self.config.max_retries,
            backoff_ms: self.config.backoff_ms(),
        };
        let due = self.operations.list_due(Utc::now(), policy).await?;
        if due.is_empty() {
            return Ok(report);
        }
        info!(count = due.len(), "Draining pending operations");

        for operation in due {
            report.processed += 1;
            let Some(handler) = self.handler_for(operation.entity_kind) else {
                error!(kind = %operation.entity_kind, id = operation.id, "No handler for kind");
                report.skipped += 1;
                continue;
            };
            if !handler.allowed_roles().contains(&user.role) {
                // Same gate as the pulls: the operation stays queued for a
                // session whose role may replay this kind.
                report.skipped += 1;
                warn!(
                    kind = %operation.entity_kind,
                    id = operation.id,
                    role = %user.role,
                    "Role not in replay allow-list, deferred"
                );
                continue;
            }

            self.operations
                .mark_in_flight(operation.id, Utc::now())
                .await?;

            match handler.handle(&operation).await {
                Ok(()) => {
                    self.operations.remove(operation.id).await?;
                    self.set_entity_error(&operation, None).await?;
                    report.succeeded += 1;
                    debug!(id = operation.id, op = %operation.operation, "Replay succeeded");
                }
                Err(AppError::DependencyNotReady(reason)) => {
                    // The blocking create is further down the queue or has
                    // itself failed. Leave this one untouched for a later run.
                    self.operations.mark_pending(operation.id).await?;
                    report.skipped += 1;
                    warn!(id = operation.id, %reason, "Dependency not ready, deferred");
                }
                Err(AppError::Unauthenticated) => {
                    self.operations.mark_pending(operation.id).await?;
                    warn!(id = operation.id, "Session expired mid-drain, aborting run");
                    return Err(AppError::Unauthenticated);
                }
                Err(e) => {
                    let message = e.to_string();
                    self.operations
                        .mark_failed(operation.id, &message, Utc::now())
                        .await?;
                    self.set_entity_error(&operation, Some(message.clone()))
                        .await?;
                    report.failed += 1;
                    error!(id = operation.id, op = %operation.operation, error = %message, "Replay failed");
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "Drain finished"
        );
        Ok(report)
    }

    async fn set_entity_error(
        &self,
        operation: &PendingOperation,
        error: Option<String>,
    ) -> Result<()> {
        if let Some(record) = self
            .entities
            .find_by_either_id(operation.entity_kind, &operation.entity_id)
            .await?
        {
            if record.sync_error != error {
                self.entities.set_sync_error(record.row_id, error).await?;
            }
        }
        Ok(())
    }
}
