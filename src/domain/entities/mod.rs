mod entity_record;
mod pending_operation;
mod relation_row;
mod sync_report;

pub use entity_record::{EntityDraft, EntityRecord};
pub use pending_operation::{OperationDraft, OperationStatus, PendingOperation};
pub use relation_row::{RelationEnd, RelationRow};
pub use sync_report::SyncReport;
