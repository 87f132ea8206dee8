//! Application configuration
//!
//! Settings live in a JSON file in the user's config directory:
//! - Linux: ~/.config/photo-gallery/config.json
//! - macOS: ~/Library/Application Support/photo-gallery/config.json
//! - Windows: %APPDATA%\photo-gallery\config.json
//!
//! Every field is optional; a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const APP_DIR: &str = "photo-gallery";

/// Overrides `data_dir` when set
pub const DATA_DIR_ENV: &str = "PHOTO_GALLERY_DATA_DIR";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where the catalog database and uploaded files are kept
    pub data_dir: PathBuf,

    /// Comments fetched per page
    pub comments_per_page: u32,

    /// Upper bound on scheduler passes per flush before the effect graph
    /// is considered misconfigured
    pub max_passes: usize,

    /// Lifetime of a login session
    pub session_ttl_secs: i64,

    /// `tracing` filter used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            comments_per_page: 10,
            max_passes: 64,
            session_ttl_secs: 60 * 60,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from)))
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        config.comments_per_page = config.comments_per_page.max(1);
        Ok(config)
    }

    /// Get the path where the config file is expected
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    pub fn with_env_overrides(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    /// SQLite catalog file
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("gallery.db")
    }

    /// Directory holding uploaded image files
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
