//! Application configuration.
//!
//! The configuration is a JSON file, by default
//! `$XDG_CONFIG_HOME/autoscaler/config.json`.  It is read once at startup
//! and the resulting [`Config`] is handed by value to the control loop.
//!
//! # Example
//!
//! ```json
//! {
//!   "screen": "DP-1",
//!   "command": "xrandr --output DP-1 --scale ${scale}x${scale}",
//!   "events": ["RRScreenChangeNotify"],
//!   "scale": [
//!     { "width": 0, "height": 0, "scale": 1.0 },
//!     { "width": 1920, "height": 1080, "scale": "1.5" }
//!   ],
//!   "debounce_ms": 500
//! }
//! ```

use crate::scale::ScaleTable;
use crate::watcher::DEFAULT_EVENTS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of the output to watch, as printed by the display query.
    pub screen: String,

    /// Shell command run with `scale`, `width` and `height` in its
    /// environment.
    pub command: String,

    /// Notification event names that trigger a re-check.
    #[serde(default = "default_events")]
    pub events: Vec<String>,

    /// Threshold rules.  Always sorted by ascending scale.
    #[serde(rename = "scale", default)]
    pub scales: ScaleTable,

    /// Minimum time between two command runs (ms).  `0` disables the
    /// debounce window.
    #[serde(default)]
    pub debounce_ms: u64,
}

fn default_events() -> Vec<String> {
    DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect()
}

impl Config {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e.0)))
    }

    /// Parse and validate configuration text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.screen.trim().is_empty() {
            return Err(ConfigError("\"screen\" must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError("\"command\" must not be empty".into()));
        }
        if let Some(rule) = self
            .scales
            .rules()
            .iter()
            .find(|r| !r.scale.is_finite() || r.scale <= 0.0)
        {
            return Err(ConfigError(format!("invalid scale {}", rule.scale)));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Resolve the default configuration path.
///
/// `$XDG_CONFIG_HOME/autoscaler/config.json`, then
/// `$HOME/.config/autoscaler/config.json`, then `autoscaler.json` in the
/// working directory.
pub fn default_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    match base {
        Some(dir) => dir.join("autoscaler").join("config.json"),
        None => PathBuf::from("autoscaler.json"),
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
