use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("settings io ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Cross-session state shared by the control surfaces and the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_enabled: Option<bool>,
}

impl Settings {
    /// No stored value means enabled.
    pub fn enabled(&self) -> bool {
        self.plugin_enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<local data dir>/element-stylist/settings.json`, or the working
    /// directory when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join("element-stylist"))
            .unwrap_or_default()
            .join(SETTINGS_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, StorageError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let file = std::fs::File::open(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Like `load`, but a missing or unreadable file yields defaults.
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default settings");
            Settings::default()
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(io_err)?;
        serde_json::to_writer_pretty(file, settings).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        let mut settings = self.load_or_default();
        settings.plugin_enabled = Some(enabled);
        self.save(&settings)
    }
}
