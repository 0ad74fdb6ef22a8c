pub mod api;
pub mod database;
pub mod storage;
pub mod tracking;
