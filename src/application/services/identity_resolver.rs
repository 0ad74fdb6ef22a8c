use crate::application::ports::EntityStore;
use crate::domain::value_objects::{EntityKind, LocalId, ServerId};
use crate::shared::error::{AppError, Result};
use std::sync::Arc;

/// Outcome of mapping a domain identifier to its authoritative server id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The record is synced; this is the id the remote API knows.
    Server(ServerId),
    /// The record exists locally but has not synced yet.
    Pending(LocalId),
    /// No local record matches the id at all.
    Unknown,
}

/// Maps identifiers that may be either local or server ids onto server ids.
///
/// A local id is never forwarded to the remote API; callers decide between
/// skipping the item and failing the enclosing call.
pub struct IdentityResolver {
    entities: Arc<dyn EntityStore>,
}

impl IdentityResolver {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }

    pub async fn resolve(&self, kind: EntityKind, id: &str) -> Result<Resolution> {
        let Some(record) = self.entities.find_by_either_id(kind, id).await? else {
            return Ok(Resolution::Unknown);
        };

        if let Some(server_id) = record.server_id {
            return Ok(Resolution::Server(server_id));
        }

        let local_id = record
            .local_id
            .ok_or_else(|| AppError::Internal(format!("record for {id} carries no identifier")))?;
        Ok(Resolution::Pending(local_id))
    }

    /// Resolution as a hard requirement: unsynced records fail with
    /// `DependencyNotReady`, unknown ids with `NotFound`.
    pub async fn require(&self, kind: EntityKind, id: &str) -> Result<ServerId> {
        match self.resolve(kind, id).await? {
            Resolution::Server(server_id) => Ok(server_id),
            Resolution::Pending(local_id) => Err(AppError::DependencyNotReady(format!(
                "{kind} {local_id} has not synced yet"
            ))),
            Resolution::Unknown => Err(AppError::NotFound(format!("{kind} {id}"))),
        }
    }
}
