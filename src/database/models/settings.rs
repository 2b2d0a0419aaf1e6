// Database models - Settings
use serde::{Deserialize, Serialize};

/// A single setting stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub updated_at: String,
}

/// Client-side state loaded at startup
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientSettings {
    pub setup_complete: bool,
    pub indexed_folders: Vec<String>,
    pub search_history: Vec<String>,
}
