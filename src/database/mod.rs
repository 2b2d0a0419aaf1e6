// Database module for the FindMyFile client
// SQLite persistence for the setup flag, indexed folders and search history

pub mod manager;
pub mod migrations;
pub mod models;
pub mod settings_repo;

pub use manager::{DatabaseManager, DATABASE_FILE};
pub use models::*;
pub use settings_repo::keys;
