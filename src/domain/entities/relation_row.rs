use crate::domain::entities::EntityRecord;
use crate::domain::value_objects::{LocalId, RelationKind, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a relation row: whichever of the owning entity's identifiers
/// is currently known. Resolvable once the server id is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationEnd {
    pub local_id: Option<LocalId>,
    pub server_id: Option<ServerId>,
}

impl RelationEnd {
    pub fn new(local_id: Option<LocalId>, server_id: Option<ServerId>) -> Result<Self, String> {
        if local_id.is_none() && server_id.is_none() {
            return Err("Relation end needs a local or a server identifier".to_string());
        }
        Ok(Self {
            local_id,
            server_id,
        })
    }

    pub fn from_record(record: &EntityRecord) -> Self {
        Self {
            local_id: record.local_id.clone(),
            server_id: record.server_id.clone(),
        }
    }

    pub fn server(server_id: ServerId) -> Self {
        Self {
            local_id: None,
            server_id: Some(server_id),
        }
    }
}

/// Persisted join-table row for a many-to-many actor link. Created
/// optimistically with whichever ids are known and rewritten in place with
/// server ids once both owners have synced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationRow {
    pub id: i64,
    pub kind: RelationKind,
    pub owner: RelationEnd,
    pub member: RelationEnd,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl RelationRow {
    pub fn is_resolved(&self) -> bool {
        self.owner.server_id.is_some() && self.member.server_id.is_some()
    }
}
