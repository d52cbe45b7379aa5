use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::ConnectionInfo;

const APP_DIR: &str = "space_report";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionInfo,
    pub catalog_path: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            connection: ConnectionInfo::default(),
            catalog_path: None,
            log_level: "info".to_string(),
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push(APP_DIR);
            path.push("config.json");
            path
        })
    }

    pub fn default_catalog_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push(APP_DIR);
            path.push("catalog.json");
            path
        })
    }

    /// Load from `path`, or from the default location. A missing file
    /// gives defaults; an unreadable or malformed one is an error.
    pub fn try_load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::config_path) {
            Some(path) => path,
            None => return Ok(Self::new()),
        };
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Like `try_load`, but falls back to defaults and hands back the
    /// problem so it can be reported once logging is up.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<ConfigError>) {
        match Self::try_load(path) {
            Ok(config) => (config, None),
            Err(err) => (Self::new(), Some(err)),
        }
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = match path.map(Path::to_path_buf).or_else(Self::config_path) {
            Some(path) => path,
            None => return Ok(()),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn resolved_catalog_path(&self) -> Option<PathBuf> {
        self.catalog_path.clone().or_else(Self::default_catalog_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
