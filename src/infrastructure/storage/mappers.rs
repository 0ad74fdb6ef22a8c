use crate::domain::entities::{
    EntityRecord, OperationStatus, PendingOperation, RelationEnd, RelationRow,
};
use crate::domain::value_objects::{
    EntityKind, LocalId, OperationKind, OperationPayload, RelationKind, ServerId, UserId,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

use super::rows::{EntityRecordRow, PendingOperationRow, RelationLinkRow};

pub fn entity_record_from_row(row: EntityRecordRow) -> Result<EntityRecord, AppError> {
    let kind = EntityKind::parse(&row.kind).map_err(AppError::Validation)?;
    let local_id = row
        .local_id
        .map(|id| LocalId::new(id).map_err(AppError::Validation))
        .transpose()?;
    let server_id = row
        .server_id
        .map(|id| ServerId::new(id).map_err(AppError::Validation))
        .transpose()?;
    let data = serde_json::from_str(&row.data)?;

    Ok(EntityRecord {
        row_id: row.id,
        kind,
        local_id,
        server_id,
        data,
        sync_error: row.sync_error,
        created_at: millis_to_datetime(row.created_at),
        updated_at: millis_to_datetime(row.updated_at),
        synced_at: row.synced_at.map(millis_to_datetime),
    })
}

pub fn pending_operation_from_row(row: PendingOperationRow) -> Result<PendingOperation, AppError> {
    let entity_kind = EntityKind::parse(&row.entity_kind).map_err(AppError::Validation)?;
    let operation = OperationKind::parse(&row.operation).map_err(AppError::Validation)?;
    let payload = OperationPayload::from_json_str(&row.payload).map_err(AppError::Validation)?;
    let user_id = UserId::new(row.user_id).map_err(AppError::Validation)?;
    let status = OperationStatus::parse(&row.status).map_err(AppError::Validation)?;
    let retries = u32::try_from(row.retries)
        .map_err(|_| AppError::Validation("retries cannot be negative".to_string()))?;

    Ok(PendingOperation {
        id: row.id,
        entity_kind,
        entity_id: row.entity_id,
        operation,
        payload,
        user_id,
        status,
        retries,
        error_message: row.error_message,
        created_at: millis_to_datetime(row.created_at),
        updated_at: millis_to_datetime(row.updated_at),
        last_attempt_at: row.last_attempt_at.map(millis_to_datetime),
    })
}

pub fn relation_row_from_row(row: RelationLinkRow) -> Result<RelationRow, AppError> {
    let kind = RelationKind::parse(&row.kind).map_err(AppError::Validation)?;
    let owner = relation_end(row.owner_local_id, row.owner_server_id)?;
    let member = relation_end(row.member_local_id, row.member_server_id)?;

    Ok(RelationRow {
        id: row.id,
        kind,
        owner,
        member,
        created_at: millis_to_datetime(row.created_at),
        synced_at: row.synced_at.map(millis_to_datetime),
    })
}

fn relation_end(
    local_id: Option<String>,
    server_id: Option<String>,
) -> Result<RelationEnd, AppError> {
    let local_id = local_id
        .map(|id| LocalId::new(id).map_err(AppError::Validation))
        .transpose()?;
    let server_id = server_id
        .map(|id| ServerId::new(id).map_err(AppError::Validation))
        .transpose()?;
    RelationEnd::new(local_id, server_id).map_err(AppError::Validation)
}

pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
