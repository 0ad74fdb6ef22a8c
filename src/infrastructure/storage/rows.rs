use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct EntityRecordRow {
    pub id: i64,
    pub kind: String,
    pub local_id: Option<String>,
    pub server_id: Option<String>,
    pub data: String,
    pub sync_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub synced_at: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PendingOperationRow {
    pub id: i64,
    pub entity_kind: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: String,
    pub user_id: String,
    pub status: String,
    pub retries: i64,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_attempt_at: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RelationLinkRow {
    pub id: i64,
    pub kind: String,
    pub owner_local_id: Option<String>,
    pub owner_server_id: Option<String>,
    pub member_local_id: Option<String>,
    pub member_server_id: Option<String>,
    pub created_at: i64,
    pub synced_at: Option<i64>,
}
