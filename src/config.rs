use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::time::TimestampHints;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// Logs every row as it is converted.
    pub debug: bool,
    /// Zone of timestamps that are exported without one.
    pub local_timezone: Tz,
    pub dayfirst: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            local_timezone: chrono_tz::UTC,
            dayfirst: false,
        }
    }
}

impl Config {
    pub(crate) fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cryptoconv").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Reads an explicitly given config file, or the one in the user's
    /// config directory when it exists.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub(crate) fn timestamp_hints(&self) -> TimestampHints {
        TimestampHints {
            dayfirst: self.dayfirst,
            tz: self.local_timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.debug);
        assert_eq!(config.timestamp_hints(), TimestampHints::default());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "local_timezone": "Europe/Amsterdam" }}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.local_timezone, chrono_tz::Europe::Amsterdam);
        assert!(!config.debug);
        assert!(!config.dayfirst);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "local_timezone": "Mars/Olympus" }}"#).unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.json"))).is_err());
    }
}
