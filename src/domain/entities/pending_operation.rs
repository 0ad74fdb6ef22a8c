use crate::domain::value_objects::{EntityKind, OperationKind, OperationPayload, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    InFlight,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InFlight => "in_flight",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(OperationStatus::Pending),
            "in_flight" => Ok(OperationStatus::InFlight),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(format!("Unknown operation status: {other}")),
        }
    }
}

/// A queued mutation intent, persisted until its remote replay succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub id: i64,
    pub entity_kind: EntityKind,
    /// Local or server id of the record the operation targets.
    pub entity_id: String,
    pub operation: OperationKind,
    pub payload: OperationPayload,
    pub user_id: UserId,
    pub status: OperationStatus,
    pub retries: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct OperationDraft {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub operation: OperationKind,
    pub payload: OperationPayload,
    pub user_id: UserId,
}

impl OperationDraft {
    pub fn new(
        entity_kind: EntityKind,
        entity_id: String,
        operation: OperationKind,
        payload: OperationPayload,
        user_id: UserId,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            operation,
            payload,
            user_id,
        }
    }
}
