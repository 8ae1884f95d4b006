//! Persistent application settings.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// What the batch runner writes to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Images,
    Data,
    #[default]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub working_dir: PathBuf,
    pub pipeline_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_mode: OutputMode,
}

impl Default for Settings {
    fn default() -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            working_dir: base.join("working_directory"),
            pipeline_dir: base.join("pipelines"),
            output_dir: base.join("processed_outputs"),
            output_mode: OutputMode::default(),
        }
    }
}

impl Settings {
    fn settings_path() -> Option<PathBuf> {
        dirs_next::data_dir().map(|d| d.join("dev.pixelflow").join("settings.json"))
    }

    /// Load the persisted settings, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "invalid settings file, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| AppError::Config("no platform data directory".into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
