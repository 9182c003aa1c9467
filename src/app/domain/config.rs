use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;

use crate::app::infrastructure::error::AppError;

/// Engine tuning, stored as JSON in the platform config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of inlined fonts kept in the persistent cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Upper bound for each stylesheet or font file fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound for the cache read on the injection path; on expiry the
    /// online `@import` is used instead
    #[serde(default = "default_cache_lookup_timeout_ms")]
    pub cache_lookup_timeout_ms: u64,

    /// href of the static theme stylesheet
    #[serde(default = "default_theme_stylesheet")]
    pub theme_stylesheet: String,

    /// Path to the font catalog (`fonts.json`); the built-in fallback is used when unset
    #[serde(default)]
    pub font_catalog: Option<PathBuf>,

    /// Path of the key-value store file; defaults to the data directory
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    #[serde(default = "default_storage_quota_bytes")]
    pub storage_quota_bytes: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_cache_capacity() -> usize {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_cache_lookup_timeout_ms() -> u64 {
    1500
}

fn default_theme_stylesheet() -> String {
    "themes.css".to_string()
}

fn default_storage_quota_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_user_agent() -> String {
    // Web font services pick the font format by user agent; this one gets woff2.
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cache_lookup_timeout_ms: default_cache_lookup_timeout_ms(),
            theme_stylesheet: default_theme_stylesheet(),
            font_catalog: None,
            storage_path: None,
            storage_quota_bytes: default_storage_quota_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl EngineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn cache_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_lookup_timeout_ms)
    }

    /// Load config from disk, or create default if not exists
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                // File doesn't exist, use defaults
                let default = Self::default();
                // Try to save defaults for next time
                if let Err(e) = default.save_to(path) {
                    warn!("Could not write default config: {}", e);
                }
                default
            }
        }
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        Ok(())
    }

    /// Get config file path (cross-platform)
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("font-changer");
        path.push("config.json");
        path
    }

    /// Storage file path, from config or the platform data directory
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push("font-changer");
            path.push("storage.json");
            path
        })
    }
}
