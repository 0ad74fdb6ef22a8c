use crate::domain::entities::{RelationEnd, RelationRow};
use crate::domain::value_objects::{LocalId, RelationKind, ServerId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Join-table storage for many-to-many actor links.
///
/// Membership changes are full replacements (delete-all then bulk insert):
/// the remote API reconciles diffs server-side, the local cache only mirrors
/// the end state.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Drop every row of `kind` for this owner (matched on either owner id)
    /// and insert one row per member, atomically.
    async fn replace_for_owner(
        &self,
        kind: RelationKind,
        owner: &RelationEnd,
        members: &[RelationEnd],
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Rows of `kind` whose owner matches `owner_id` on either side.
    async fn list_for_owner(
        &self,
        kind: RelationKind,
        owner_id: &str,
    ) -> Result<Vec<RelationRow>, AppError>;

    /// Rewrite owner references in place once the owner entity has synced.
    async fn rekey_owner(
        &self,
        kind: RelationKind,
        local_id: &LocalId,
        server_id: &ServerId,
    ) -> Result<u32, AppError>;

    /// Rewrite member references in place once the member entity has synced.
    async fn rekey_member(
        &self,
        kind: RelationKind,
        local_id: &LocalId,
        server_id: &ServerId,
    ) -> Result<u32, AppError>;

    async fn mark_synced_for_owner(
        &self,
        kind: RelationKind,
        owner_id: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn delete_for_owner(&self, kind: RelationKind, owner_id: &str) -> Result<u32, AppError>;

    async fn clear_all(&self) -> Result<(), AppError>;
}
