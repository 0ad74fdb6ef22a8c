use crate::domain::value_objects::SessionUser;

/// Session collaborator supplied by the host application.
pub trait AuthSession: Send + Sync {
    /// The authenticated user, if any. Queue writes are refused without one:
    /// pending operations are scoped per user for sync-on-login.
    fn current_user(&self) -> Option<SessionUser>;

    fn bearer_token(&self) -> Option<String>;
}
