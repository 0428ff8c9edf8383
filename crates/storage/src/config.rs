//! Store configuration loaded from TOML.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where and how the SQLite database is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Database file. In-memory when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Use write-ahead logging so readers do not block the writer.
    /// Ignored for in-memory databases.
    #[serde(default = "default_wal")]
    pub wal: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_wal() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            wal: default_wal(),
        }
    }
}

impl StoreConfig {
    /// Configuration for a database file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::parse("").unwrap();
        assert!(config.path.is_none());
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.wal);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
path = "/var/lib/app/events.db"
busy_timeout_ms = 250
wal = false
"#;
        let config = StoreConfig::parse(toml).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/var/lib/app/events.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.wal);
    }

    #[test]
    fn test_parse_invalid() {
        let err = StoreConfig::parse("busy_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("store.toml");
        std::fs::write(&file, "path = \"events.db\"\n").unwrap();

        let config = StoreConfig::load(&file).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("events.db")));
        assert!(matches!(
            StoreConfig::load(dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }
}
