use crate::domain::value_objects::EntityKind;

/// Server-reported change counts per entity kind, populated out-of-band by a
/// polling/heartbeat collaborator. The engine only reads them to decide
/// whether an incremental pull is worth attempting.
pub trait DeltaTracker: Send + Sync {
    fn get_count(&self, kind: EntityKind) -> u32;
    fn set_count(&self, kind: EntityKind, count: u32);
}
