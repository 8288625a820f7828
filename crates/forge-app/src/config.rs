//! Application manifest (`forge.toml`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::window::WindowOptions;

pub const DEFAULT_APP_NAME: &str = "Forge Application";
pub const DEFAULT_APP_DESCRIPTION: &str = "An application built with Forge";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub windows: Vec<WindowOptions>,
    pub tray: Option<TrayConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub description: String,
    /// Icon file, relative to the app directory
    pub icon: Option<PathBuf>,
    pub crash_reporting: bool,
    pub crash_report_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `FORGE_LOG` is unset
    pub level: String,
    /// Skip installing a subscriber entirely
    pub silent: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    pub tooltip: Option<String>,
    pub icon: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Configured name, or the default when blank
    pub fn name(&self) -> &str {
        non_empty_or(&self.app.name, DEFAULT_APP_NAME)
    }

    pub fn description(&self) -> &str {
        non_empty_or(&self.app.description, DEFAULT_APP_DESCRIPTION)
    }
}

pub(crate) fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}
