mod connection;
mod schema;

pub use connection::{Database, DbPool};
pub use schema::create_all_tables;
