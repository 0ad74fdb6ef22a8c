mod api_client;
mod auth_session;
mod delta_tracker;
mod entity_store;
mod operation_store;
mod relation_store;
mod session_events;
mod settings_store;

pub use api_client::ApiClient;
pub use auth_session::AuthSession;
pub use delta_tracker::DeltaTracker;
pub use entity_store::EntityStore;
pub use operation_store::{DuePolicy, OperationStore};
pub use relation_store::RelationStore;
pub use session_events::SessionObserver;
pub use settings_store::SettingsStore;
