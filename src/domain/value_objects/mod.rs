mod entity_kind;
mod ids;
mod operation_kind;
mod payload;
mod relation_kind;
mod user;

pub use entity_kind::EntityKind;
pub use ids::{LocalId, ServerId};
pub use operation_kind::OperationKind;
pub use payload::{merge_json, OperationPayload};
pub use relation_kind::RelationKind;
pub use user::{SessionUser, UserId, UserRole};
