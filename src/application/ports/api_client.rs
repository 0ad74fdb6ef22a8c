use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Remote JSON/HTTP collaborator.
///
/// Implementations unwrap the `{ "success": bool, "data": ... }` envelope and
/// return the `data` document. `success: false` and HTTP 4xx become
/// `AppError::Remote`; connectivity and 5xx problems become
/// `AppError::Network`; a missing bearer token is `AppError::Unauthenticated`
/// and is checked before the request leaves the device.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, AppError>;
    async fn post(&self, path: &str, body: &Value) -> Result<Value, AppError>;
    async fn put(&self, path: &str, body: &Value) -> Result<Value, AppError>;
    async fn patch(&self, path: &str, body: &Value) -> Result<Value, AppError>;
    async fn delete(&self, path: &str) -> Result<Value, AppError>;
}
