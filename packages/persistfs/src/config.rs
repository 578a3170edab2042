//! Volume configuration.

use std::path::Path;
use std::time::Duration;

use persistfs_host::{MountOptions, MountPath};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where persisted application state is mounted unless configured otherwise.
pub const DEFAULT_MOUNT_PATH: &str = "/persist";

/// Configuration for mounting and syncing the persistent volume.
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```json
/// {"mount_path": "/saves", "sync_timeout_ms": 5000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Absolute path the volume is mounted at.
    pub mount_path: MountPath,

    /// Write changes through to durable storage without explicit flushes.
    pub auto_persist: bool,

    /// Give up on the initial sync after this many milliseconds.
    ///
    /// `None` waits for the host for as long as it takes.
    pub sync_timeout_ms: Option<u64>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            mount_path: MountPath::parse(DEFAULT_MOUNT_PATH).expect("default mount path is valid"),
            auto_persist: true,
            sync_timeout_ms: None,
        }
    }
}

impl VolumeConfig {
    /// Parse a JSON config document.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_ms.map(Duration::from_millis)
    }

    pub fn mount_options(&self) -> MountOptions {
        MountOptions {
            auto_persist: self.auto_persist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VolumeConfig::default();
        assert_eq!(config.mount_path.to_string(), "/persist");
        assert!(config.auto_persist);
        assert_eq!(config.sync_timeout(), None);
        assert!(config.mount_options().auto_persist);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = VolumeConfig::from_json(r#"{"sync_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.mount_path.to_string(), "/persist");
        assert_eq!(config.sync_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn relative_mount_path_rejected() {
        let err = VolumeConfig::from_json(r#"{"mount_path": "persist"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("volume.json");
        std::fs::write(&file, r#"{"mount_path": "/saves", "auto_persist": false}"#).unwrap();

        let config = VolumeConfig::load(&file).unwrap();
        assert_eq!(config.mount_path.to_string(), "/saves");
        assert!(!config.auto_persist);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = VolumeConfig::load("/nonexistent/volume.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/volume.json"));
    }
}
