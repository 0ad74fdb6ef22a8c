mod identity_resolver;
mod pending_queue;
mod relation_reconciler;
mod session_watcher;
mod sync_engine;

pub use identity_resolver::{IdentityResolver, Resolution};
pub use pending_queue::PendingQueue;
pub use relation_reconciler::RelationReconciler;
pub use session_watcher::{LocalDataReset, SessionWatcher};
pub use sync_engine::{SyncEngine, SyncHandler};
