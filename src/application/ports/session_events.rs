use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Subscriber to session lifecycle changes.
///
/// Registered explicitly on the `SessionWatcher` rather than passed as a
/// constructor closure, so the lifecycle is visible and testable.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    async fn on_user_changed(
        &self,
        previous: Option<&UserId>,
        current: Option<&UserId>,
    ) -> Result<(), AppError>;
}
