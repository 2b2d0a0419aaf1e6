//! Client configuration
//!
//! Resolution order: built-in defaults, then `findmyfile.json` in the data
//! directory, then environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ServiceConfig;
use crate::search::DEFAULT_RESULT_LIMIT;

pub const CONFIG_FILE: &str = "findmyfile.json";

pub const ENV_API_URL: &str = "FINDMYFILE_API_URL";
pub const ENV_DATA_DIR: &str = "FINDMYFILE_DATA_DIR";
pub const ENV_TIMEOUT_SECS: &str = "FINDMYFILE_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    /// Where the client database and config file live
    pub data_dir: PathBuf,
    pub progress_interval_ms: u64,
    pub status_interval_ms: u64,
    pub default_result_limit: usize,
    pub face_result_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            data_dir: default_data_dir(),
            progress_interval_ms: 1000,
            status_interval_ms: 5000,
            default_result_limit: DEFAULT_RESULT_LIMIT,
            face_result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

/// `<platform data dir>/findmyfile`, or `./findmyfile` if there is none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("findmyfile")
}

impl ClientConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load with a custom variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut config = match Self::read_file(&data_dir.join(CONFIG_FILE))? {
            Some(config) => config,
            None => Self::default(),
        };
        config.data_dir = data_dir;
        config.apply_overrides(&lookup)?;

        log::debug!("Loaded client config: {:?}", config);
        Ok(config)
    }

    /// `None` when the file does not exist
    pub fn read_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        log::info!("Using config file {:?}", path);
        Ok(Some(config))
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.service.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.service.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_TIMEOUT_SECS, raw))?;
        }

        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }
}
