//! Stage settings
//!
//! Only host-side knobs live here. Line parameters are fixed in
//! [`crate::protocol`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{
    DEFAULT_SETTLE_MS, DEFAULT_TIMEOUT_MS, MAX_SETTLE_MS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS,
};

/// Errors loading a settings file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Host-side settings for a stage session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Serial port name
    pub port_name: String,
    /// Per-line read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Delay before the `G:` that follows a staged move, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            port_name: default_port_name().to_string(),
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_MS,
        }
    }
}

#[cfg(windows)]
fn default_port_name() -> &'static str {
    "COM3"
}

#[cfg(not(windows))]
fn default_port_name() -> &'static str {
    "/dev/ttyUSB0"
}

impl StageConfig {
    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: StageConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!("loaded settings from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Read timeout, clamped to what the controller needs
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    /// Settle delay, capped at one second
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.min(MAX_SETTLE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StageConfig::default();
        assert_eq!(config.read_timeout(), Duration::from_millis(2000));
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert!(!config.port_name.is_empty());
    }

    #[test]
    fn test_clamping() {
        let config = StageConfig {
            port_name: "stub".into(),
            read_timeout_ms: 60_000,
            settle_delay_ms: 10_000,
        };
        assert_eq!(config.read_timeout(), Duration::from_millis(5000));
        assert_eq!(config.settle_delay(), Duration::from_millis(1000));

        let config = StageConfig {
            read_timeout_ms: 10,
            ..config
        };
        assert_eq!(config.read_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "port_name": "/dev/ttyUSB3", "settle_delay_ms": 800 }}"#).unwrap();

        let config = StageConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB3");
        assert_eq!(config.settle_delay_ms, 800);
        assert_eq!(config.read_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_load_errors() {
        let missing = StageConfig::from_json_file("/nonexistent/shot204.json");
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let bad = StageConfig::from_json_file(file.path());
        assert!(matches!(bad, Err(ConfigError::Parse { .. })));
    }
}
