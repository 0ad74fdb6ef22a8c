mod mappers;
mod rows;
mod sqlite_entity_store;
mod sqlite_operation_store;
mod sqlite_relation_store;
mod sqlite_settings_store;

pub use sqlite_entity_store::SqliteEntityStore;
pub use sqlite_operation_store::SqliteOperationStore;
pub use sqlite_relation_store::SqliteRelationStore;
pub use sqlite_settings_store::SqliteSettingsStore;
