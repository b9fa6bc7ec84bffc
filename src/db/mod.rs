//! Database layer: connection setup, schema creation, and migrations

pub mod init;
pub mod migrations;
pub mod models;

pub use init::init_database;
pub use migrations::run_migrations;
