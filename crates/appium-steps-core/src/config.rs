//! Persistent configuration for step execution.
//!
//! Settings are read from `./appium-steps.json` in the working directory, or
//! from `<config dir>/appium-steps/config.json` (e.g. `~/.config` on Linux)
//! when no project file exists. Every field is optional in the file.
//!
//! # Example
//!
//! ```no_run
//! use appium_steps_core::config::StepsConfig;
//!
//! // Load (returns defaults if no file exists)
//! let config = StepsConfig::load();
//! println!("default wait: {}ms", config.default_timeout_ms);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::Platform;

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILENAME: &str = "appium-steps.json";

const USER_CONFIG_DIR: &str = "appium-steps";
const USER_CONFIG_FILENAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Step execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsConfig {
    /// Wait applied by steps that need an element to be displayed first.
    pub default_timeout_ms: u64,

    /// Wait applied by the explicit `I wait until ...` steps.
    pub long_timeout_ms: u64,

    /// Delay between polls while waiting on device state.
    pub poll_interval_ms: u64,

    /// Report equally specific matches as ambiguous instead of taking the
    /// first registration.
    pub strict: bool,

    /// Platform assumed when the runner does not set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            long_timeout_ms: 30_000,
            poll_interval_ms: 100,
            strict: false,
            platform: None,
        }
    }
}

impl StepsConfig {
    /// Loads the project config, then the user config, else defaults.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn load() -> Self {
        let candidates = std::iter::once(PathBuf::from(PROJECT_CONFIG_FILENAME))
            .chain(user_config_path());
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(error = %e, "Ignoring config file"),
            }
        }
        Self::default()
    }

    /// Loads config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn long_timeout(&self) -> Duration {
        Duration::from_millis(self.long_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = StepsConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert_eq!(config.long_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(!config.strict);
        assert!(config.platform.is_none());
    }

    #[test]
    fn deserialize_empty_json() {
        let loaded: StepsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(loaded, StepsConfig::default());
    }

    #[test]
    fn deserialize_partial_json() {
        let loaded: StepsConfig =
            serde_json::from_str(r#"{"default_timeout_ms": 5000, "platform": "ios"}"#).unwrap();
        assert_eq!(loaded.default_timeout_ms, 5000);
        assert_eq!(loaded.long_timeout_ms, 30_000);
        assert_eq!(loaded.platform, Some(Platform::Ios));
    }

    #[test]
    fn load_from_reports_missing_file() {
        let path = std::env::temp_dir().join(format!("appium_steps_missing_{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(StepsConfig::load_from(&path), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn load_from_reports_bad_json() {
        let path = std::env::temp_dir().join(format!("appium_steps_bad_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = StepsConfig::load_from(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_returns_something_without_panicking() {
        // A real config file may exist on the machine; only check it loads.
        let _ = StepsConfig::load();
    }
}
