//! Configuration module for flowgraph
//!
//! Engine settings are stored as TOML. Without an explicit path the file is
//! looked up in the platform-appropriate config directory:
//!
//! - **Linux**: `~/.config/dev.hxyulin.flowgraph/engine.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.flowgraph/engine.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.flowgraph\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use flowgraph::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default(None)?;
//! config.save("engine.toml")?;
//! ```

use crate::error::{FlowError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.flowgraph";

/// Engine config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,flowgraph=debug";

/// Default number of passes the demo pipeline runs
pub const DEFAULT_STEPS: u32 = 10;

/// Path of the engine config in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Settings for the engine binary and its demo pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
    /// Number of `step()` passes to run
    pub steps: u32,
    /// Test pattern width in pixels
    pub frame_width: u32,
    /// Test pattern height in pixels
    pub frame_height: u32,
    /// Binary threshold applied after the blur
    pub threshold: u8,
    /// Log the execution list before each pass
    pub print_execution_list: bool,
    /// Turn panicking node bodies into `Error` statuses
    pub catch_panics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            steps: DEFAULT_STEPS,
            frame_width: 320,
            frame_height: 240,
            threshold: 128,
            print_execution_list: false,
            catch_panics: true,
        }
    }
}

impl EngineConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the config at the default location when `None`.
    ///
    /// An explicit path must exist and hold a valid config. The default
    /// location is optional: no config directory or no file there yields
    /// defaults, but a file that fails to load is still returned as `Err`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) => Self::load_if_present(&path),
                None => Ok(Self::default()),
            },
        }
    }

    fn load_if_present(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(FlowError::Config(format!(
                "frame size must be positive, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.frame_width > 8192 || self.frame_height > 8192 {
            return Err(FlowError::Config(format!(
                "frame size exceeds 8192x8192, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        Ok(())
    }
}
