pub mod ports;
pub mod repositories;
pub mod services;
