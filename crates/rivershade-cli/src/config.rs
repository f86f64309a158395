// ABOUTME: Configuration file handling for the rivershade CLI.
// ABOUTME: TOML config with env var and .env support; flags override everything.

use crate::error::{CliError, Result};
use rivershade_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Where the settings files live. Unset paths fall back to platform defaults.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_settings: Option<PathBuf>,
    /// Workspace root; its settings are `<workspace>/.vscode/settings.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    /// Folder roots of a multi-root workspace.
    pub folders: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemes_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_delay_ms")]
    pub delay_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_preview_delay_ms(),
        }
    }
}

fn default_preview_delay_ms() -> u64 {
    120
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerificationConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    300
}

fn default_max_wait_ms() -> u64 {
    3000
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub user_settings: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub folders: Vec<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub schemes_dir: Option<PathBuf>,
}

impl Config {
    /// Load config with precedence: CLI > env > .env > file > defaults
    pub fn load(overrides: &Overrides) -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let path = match &overrides.config {
            Some(path) => path.clone(),
            None => Self::config_path()?,
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Read a TOML config file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("RIVERSHADE_USER_SETTINGS") {
            self.paths.user_settings = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("RIVERSHADE_WORKSPACE") {
            self.paths.workspace = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("RIVERSHADE_STATE_FILE") {
            self.paths.state_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("RIVERSHADE_SCHEMES_DIR") {
            self.paths.schemes_dir = Some(PathBuf::from(path));
        }
        if let Some(delay) = lookup("RIVERSHADE_PREVIEW_DELAY_MS") {
            if let Ok(ms) = delay.parse::<u64>() {
                self.preview.delay_ms = ms;
            }
        }
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.user_settings {
            self.paths.user_settings = Some(path.clone());
        }
        if let Some(path) = &overrides.workspace {
            self.paths.workspace = Some(path.clone());
        }
        if !overrides.folders.is_empty() {
            self.paths.folders = overrides.folders.clone();
        }
        if let Some(path) = &overrides.state_file {
            self.paths.state_file = Some(path.clone());
        }
        if let Some(path) = &overrides.schemes_dir {
            self.paths.schemes_dir = Some(path.clone());
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::rivershade_dir()?.join("config.toml"))
    }

    /// The editor's user settings file.
    pub fn user_settings_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.paths.user_settings {
            return Ok(path.clone());
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Could not find config directory".to_string()))?;
        Ok(config_dir.join("Code").join("User").join("settings.json"))
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.paths.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::rivershade_dir()?.join("state.json")),
        }
    }

    /// User scheme directory. Defaults to `<config_dir>/rivershade/schemes`.
    pub fn schemes_path(&self) -> Result<PathBuf> {
        match &self.paths.schemes_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::rivershade_dir()?.join("schemes")),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.verification.interval_ms),
            max_wait: Duration::from_millis(self.verification.max_wait_ms),
        }
    }

    pub fn preview_delay(&self) -> Duration {
        Duration::from_millis(self.preview.delay_ms)
    }

    fn rivershade_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Could not find config directory".to_string()))?;
        Ok(config_dir.join("rivershade"))
    }
}
