// Settings repository for the FindMyFile client
// Key/value CRUD plus the typed entries the client persists

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::{ClientSettings, Setting};
use super::DatabaseManager;
use crate::search::history::HistoryStore;

/// Keys of the persisted client entries
pub mod keys {
    pub const SETUP_COMPLETE: &str = "setup_complete";
    pub const INDEXED_FOLDERS: &str = "indexed_folders";
    pub const SEARCH_HISTORY: &str = "search_history";
}

impl DatabaseManager {
    /// Get a single setting by key
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| get_setting_impl(conn, key))
    }

    /// Set a single setting
    pub fn set_setting(&self, key: &str, value: &str, value_type: &str) -> Result<()> {
        self.with_connection(|conn| set_setting_impl(conn, key, value, value_type))
    }

    pub fn get_all_settings_list(&self) -> Result<Vec<Setting>> {
        self.with_connection(get_all_settings_impl)
    }

    /// Load the client entries as a structured object
    pub fn load_all_settings(&self) -> Result<ClientSettings> {
        self.with_connection(load_all_settings_impl)
    }

    pub fn set_bool_setting(&self, key: &str, value: bool) -> Result<()> {
        self.set_setting(key, if value { "true" } else { "false" }, "boolean")
    }

    pub fn get_bool_setting(&self, key: &str, default: bool) -> Result<bool> {
        match self.get_setting(key)? {
            Some(v) => Ok(v == "true"),
            None => Ok(default),
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| delete_setting_impl(conn, key))
    }

    // ===== Setup flag =====

    pub fn is_setup_complete(&self) -> Result<bool> {
        self.get_bool_setting(keys::SETUP_COMPLETE, false)
    }

    pub fn mark_setup_complete(&self) -> Result<()> {
        self.set_bool_setting(keys::SETUP_COMPLETE, true)
    }

    /// Forget the setup flag and the folder list
    pub fn reset_onboarding(&self) -> Result<()> {
        self.with_connection(|conn| {
            delete_setting_impl(conn, keys::SETUP_COMPLETE)?;
            delete_setting_impl(conn, keys::INDEXED_FOLDERS)
        })?;
        log::info!("Onboarding state reset");
        Ok(())
    }

    // ===== Indexed folders =====

    pub fn indexed_folders(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| get_string_list_impl(conn, keys::INDEXED_FOLDERS))
    }

    /// Replace the folder list (trimmed, blanks and duplicates dropped)
    pub fn set_indexed_folders(&self, folders: &[String]) -> Result<Vec<String>> {
        let folders = normalize_folders(folders.iter().map(String::as_str));
        self.with_connection(|conn| set_string_list_impl(conn, keys::INDEXED_FOLDERS, &folders))?;
        Ok(folders)
    }

    /// Append a folder; blank or already-listed paths leave the list as is
    pub fn add_indexed_folder(&self, folder: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut folders = get_string_list_impl(conn, keys::INDEXED_FOLDERS)?;
            let folder = folder.trim();
            if folder.is_empty() || folders.iter().any(|f| f == folder) {
                return Ok(folders);
            }
            folders.push(folder.to_string());
            set_string_list_impl(conn, keys::INDEXED_FOLDERS, &folders)?;
            Ok(folders)
        })
    }

    pub fn remove_indexed_folder(&self, folder: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut folders = get_string_list_impl(conn, keys::INDEXED_FOLDERS)?;
            let before = folders.len();
            folders.retain(|f| f != folder.trim());
            if folders.len() != before {
                set_string_list_impl(conn, keys::INDEXED_FOLDERS, &folders)?;
            }
            Ok(folders)
        })
    }
}

impl HistoryStore for DatabaseManager {
    fn load_history(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| get_string_list_impl(conn, keys::SEARCH_HISTORY))
    }

    fn save_history(&self, entries: &[String]) -> Result<()> {
        self.with_connection(|conn| set_string_list_impl(conn, keys::SEARCH_HISTORY, entries))
    }

    fn clear_history(&self) -> Result<()> {
        self.delete_setting(keys::SEARCH_HISTORY)
    }
}

fn normalize_folders<'a>(folders: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for folder in folders.map(str::trim) {
        if !folder.is_empty() && !out.iter().any(|f| f == folder) {
            out.push(folder.to_string());
        }
    }
    out
}

fn get_setting_impl(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT value FROM settings WHERE key = ?"
    ).context("Failed to prepare get_setting query")?;

    let result = stmt.query_row(params![key], |row| row.get(0));

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get setting"),
    }
}

fn set_setting_impl(conn: &Connection, key: &str, value: &str, value_type: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO settings (key, value, value_type, updated_at)
        VALUES (?1, ?2, ?3, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            value_type = excluded.value_type,
            updated_at = datetime('now')
        "#,
        params![key, value, value_type],
    ).context("Failed to set setting")?;

    Ok(())
}

/// JSON array stored under `key`; missing or malformed reads as empty
fn get_string_list_impl(conn: &Connection, key: &str) -> Result<Vec<String>> {
    Ok(get_setting_impl(conn, key)?
        .map(|raw| parse_string_list(key, &raw))
        .unwrap_or_default())
}

fn parse_string_list(key: &str, raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        log::warn!("Ignoring malformed {} setting: {}", key, e);
        Vec::new()
    })
}

fn set_string_list_impl(conn: &Connection, key: &str, list: &[String]) -> Result<()> {
    let json = serde_json::to_string(list)
        .with_context(|| format!("Failed to serialize {}", key))?;
    set_setting_impl(conn, key, &json, "json")
}

fn get_all_settings_impl(conn: &Connection) -> Result<Vec<Setting>> {
    let mut stmt = conn.prepare(
        "SELECT key, value, value_type, updated_at FROM settings"
    ).context("Failed to prepare get_all_settings query")?;

    let settings = stmt.query_map([], |row| {
        Ok(Setting {
            key: row.get(0)?,
            value: row.get(1)?,
            value_type: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }).context("Failed to query settings")?;

    settings.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect settings")
}

fn load_all_settings_impl(conn: &Connection) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    for setting in get_all_settings_impl(conn)? {
        match setting.key.as_str() {
            keys::SETUP_COMPLETE => settings.setup_complete = setting.value == "true",
            keys::INDEXED_FOLDERS => {
                settings.indexed_folders = parse_string_list(&setting.key, &setting.value)
            }
            keys::SEARCH_HISTORY => {
                settings.search_history = parse_string_list(&setting.key, &setting.value)
            }
            _ => {
                log::debug!("Unknown setting key: {}", setting.key);
            }
        }
    }

    Ok(settings)
}

fn delete_setting_impl(conn: &Connection, key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM settings WHERE key = ?",
        params![key],
    ).context("Failed to delete setting")?;

    Ok(())
}
