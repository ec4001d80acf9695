use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use url::Url;

use crate::api::DEFAULT_BASE_URL;

const APP_DIR: &str = "logidoc";
const CONFIG_FILE: &str = "config.json";
const PREFERENCES_FILE: &str = "preferences.json";
pub const LOG_FILE: &str = "logidoc.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    /// Backend root, e.g. `http://localhost:8000`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// `tracing` filter directive for the log file.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    /// Get the application data directory
    pub fn get_app_data_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);

        if !path.exists() {
            let _ = std::fs::create_dir_all(&path);
        }
        path
    }

    pub fn config_path() -> PathBuf {
        Self::get_app_data_dir().join(CONFIG_FILE)
    }

    pub fn preferences_path() -> PathBuf {
        Self::get_app_data_dir().join(PREFERENCES_FILE)
    }

    pub fn load() -> Result<Config> {
        Self::load_from(&Self::config_path())
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config = serde_json::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }

    /// Picks the backend URL: explicit override, then config file, then the
    /// built-in default.
    pub fn resolve_base_url(&self, override_url: Option<&str>) -> Result<Url> {
        let raw = override_url
            .or(self.api_base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        let url = Url::parse(raw).with_context(|| format!("invalid backend URL '{}'", raw))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("backend URL must be http or https, got '{}'", raw);
        }
        Ok(url)
    }

    pub fn resolve_log_level(&self, override_level: Option<&str>) -> String {
        override_level
            .or(self.log_level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    }
}
