use crate::shared::error::AppError;
use async_trait::async_trait;

/// Small persisted key/value table (per-kind `since` sync timestamps).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    async fn clear_all(&self) -> Result<(), AppError>;
}
