use crate::application::ports::{
    EntityStore, OperationStore, RelationStore, SessionObserver, SettingsStore,
};
use crate::domain::value_objects::UserId;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tracks which user the session belongs to and fans session changes out to
/// registered observers.
///
/// Observers receive the last authenticated user, not just the immediately
/// preceding session state, so a logout followed by a different login is
/// still seen as a user switch.
pub struct SessionWatcher {
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    last_user: RwLock<Option<UserId>>,
    last_authenticated: RwLock<Option<UserId>>,
}

impl SessionWatcher {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            last_user: RwLock::new(None),
            last_authenticated: RwLock::new(None),
        }
    }

    pub async fn register(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().await.push(observer);
    }

    /// Called by the host whenever the session state may have changed.
    /// Observers fire only on an actual user change.
    pub async fn on_session(&self, current: Option<UserId>) -> Result<()> {
        let previous = {
            let mut last = self.last_user.write().await;
            if *last == current {
                return Ok(());
            }
            *last = current.clone();

            let mut authenticated = self.last_authenticated.write().await;
            let previous = authenticated.clone();
            if current.is_some() {
                *authenticated = current.clone();
            }
            previous
        };

        info!(
            previous = previous.as_ref().map(UserId::as_str),
            current = current.as_ref().map(UserId::as_str),
            "Session user changed"
        );
        let observers = self.observers.read().await.clone();
        for observer in observers {
            observer
                .on_user_changed(previous.as_ref(), current.as_ref())
                .await?;
        }
        Ok(())
    }
}

impl Default for SessionWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Wipes every local table when a different user takes over the device, so
/// one user's offline queue is never replayed under another's credentials.
pub struct LocalDataReset {
    entities: Arc<dyn EntityStore>,
    operations: Arc<dyn OperationStore>,
    relations: Arc<dyn RelationStore>,
    settings: Arc<dyn SettingsStore>,
}

impl LocalDataReset {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        operations: Arc<dyn OperationStore>,
        relations: Arc<dyn RelationStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            entities,
            operations,
            relations,
            settings,
        }
    }

    async fn wipe(&self) -> Result<()> {
        self.operations.clear_all().await?;
        self.relations.clear_all().await?;
        self.entities.clear_all().await?;
        self.settings.clear_all().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionObserver for LocalDataReset {
    async fn on_user_changed(
        &self,
        previous: Option<&UserId>,
        current: Option<&UserId>,
    ) -> std::result::Result<(), AppError> {
        match (previous, current) {
            // First login on a fresh device: nothing to reset.
            (None, Some(_)) => Ok(()),
            // Logout keeps the cache so the queue survives a re-login.
            (Some(_), None) => Ok(()),
            (Some(previous), Some(current)) if previous != current => {
                warn!(%previous, %current, "Different user logged in, wiping local data");
                self.wipe().await
            }
            _ => Ok(()),
        }
    }
}
