//! Process-wide settings, resolved once at start-up.
//!
//! Values come from an optional TOML file (path in `KNOWLEDGE_CONFIG`), then
//! environment variables override individual fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Whether the site is open to anonymous readers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ExposeType {
    #[default]
    Open,
    /// Anonymous visitors see nothing, not even public articles.
    Close,
}

impl ExposeType {
    /// Lenient parse for environment input: anything other than `CLOSE` means open.
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().parse::<ExposeType>() {
            Ok(expose) => expose,
            Err(_) => {
                warn!(value = %value, "Unrecognised SYSTEM_EXPOSE_TYPE, defaulting to OPEN");
                ExposeType::Open
            }
        }
    }
}

/// Fixed page sizes per list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct PageLimits {
    pub knowledge: usize,
    pub tags: usize,
    pub comments: usize,
    pub likes: usize,
    pub histories: usize,
    pub stocks: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            knowledge: 50,
            tags: 20,
            comments: 20,
            likes: 50,
            histories: 20,
            stocks: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expose_type: ExposeType,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub page_limits: PageLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expose_type: ExposeType::Open,
            database_url: "sqlite://knowledge.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            page_limits: PageLimits::default(),
        }
    }
}

impl Config {
    /// Load from `KNOWLEDGE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("KNOWLEDGE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Override fields from `lookup`, which maps an environment key to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SYSTEM_EXPOSE_TYPE") {
            self.expose_type = ExposeType::from_env_value(&value);
        }
        if let Some(value) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database_url = value.trim().to_string();
        }
        if let Some(value) = lookup("HOST").filter(|v| !v.trim().is_empty()) {
            self.host = value.trim().to_string();
        }
        if let Some(value) = lookup("PORT") {
            self.port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?;
        }
        Ok(())
    }
}
