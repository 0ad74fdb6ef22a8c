use crate::domain::value_objects::{EntityKind, LocalId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A locally cached domain record, identified by a local id, a server id,
/// or both once the record has synced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub row_id: i64,
    pub kind: EntityKind,
    pub local_id: Option<LocalId>,
    pub server_id: Option<ServerId>,
    pub data: Value,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    pub fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    /// Whichever identifier the caller should use to reference this record:
    /// the server id once assigned, the local id before that.
    pub fn reference_id(&self) -> &str {
        if let Some(server_id) = &self.server_id {
            server_id.as_str()
        } else if let Some(local_id) = &self.local_id {
            local_id.as_str()
        } else {
            // The draft constructor guarantees at least one id.
            unreachable!("entity record without any identifier")
        }
    }
}

/// Fields for a new local row; enforces the at-least-one-id invariant.
#[derive(Debug, Clone)]
pub struct EntityDraft {
    pub kind: EntityKind,
    pub local_id: Option<LocalId>,
    pub server_id: Option<ServerId>,
    pub data: Value,
    pub synced_at: Option<DateTime<Utc>>,
}

impl EntityDraft {
    pub fn new(
        kind: EntityKind,
        local_id: Option<LocalId>,
        server_id: Option<ServerId>,
        data: Value,
    ) -> Result<Self, String> {
        if local_id.is_none() && server_id.is_none() {
            return Err("Entity draft needs a local or a server identifier".to_string());
        }
        Ok(Self {
            kind,
            local_id,
            server_id,
            data,
            synced_at: None,
        })
    }

    pub fn local(kind: EntityKind, local_id: LocalId, data: Value) -> Self {
        Self {
            kind,
            local_id: Some(local_id),
            server_id: None,
            data,
            synced_at: None,
        }
    }

    pub fn synced(kind: EntityKind, server_id: ServerId, data: Value, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            local_id: None,
            server_id: Some(server_id),
            data,
            synced_at: Some(at),
        }
    }
}
