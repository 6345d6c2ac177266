//! Engine configuration.
//!
//! Defines the YAML-serializable settings for verification limits and
//! migration behavior. Every field has a default, so an empty document (or
//! no file at all) yields a usable configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! verify:
//!   max_failure_items: 100
//!   store_descriptions: true
//! migration:
//!   skip_native_version_pragma: false
//!   scripts_dir: /opt/triplog/scripts
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use triplog_core::{DEFAULT_MAX_FAILURE_ITEMS, FailureCollector};

use crate::error::Result;

/// Limits applied while verifying.
///
/// # Examples
///
/// ```
/// # use triplog_engine::VerifyConfig;
/// let v = VerifyConfig::default();
/// assert_eq!(v.max_failure_items, 100);
/// assert!(v.store_descriptions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Cap on collected failure items before a pass stops scanning.
    pub max_failure_items: usize,
    /// Keep the free-text reason of each failure; when off, reasons become `"?"`.
    pub store_descriptions: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_failure_items: DEFAULT_MAX_FAILURE_ITEMS,
            store_descriptions: true,
        }
    }
}

impl VerifyConfig {
    /// A fresh, empty collector honoring these limits.
    pub fn collector(&self) -> FailureCollector {
        FailureCollector::new(self.max_failure_items, self.store_descriptions)
    }
}

/// Settings controlling how upgrades are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Skip writing the storage-native version pragma, for hosts that set it
    /// themselves after an upgrade.
    pub skip_native_version_pragma: bool,
    /// Read upgrade scripts from this directory instead of the bundled set.
    pub scripts_dir: Option<PathBuf>,
}

/// Top-level engine configuration.
///
/// # Examples
///
/// ```no_run
/// use triplog_engine::EngineConfig;
///
/// let config = EngineConfig::load("triplog.yml").unwrap();
/// println!("failure cap: {}", config.verify.max_failure_items);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub verify: VerifyConfig,
    pub migration: MigrationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            verify: VerifyConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::EngineError::Io) if the file cannot be read, or
    /// [`Config`](crate::EngineError::Config) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("verify:\n  max_failure_items: 7\n").unwrap();
        assert_eq!(config.verify.max_failure_items, 7);
        assert!(config.verify.store_descriptions);
        assert!(!config.migration.skip_native_version_pragma);
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triplog.yml");
        let mut config = EngineConfig::default();
        config.verify.store_descriptions = false;
        config.migration.scripts_dir = Some(PathBuf::from("/tmp/scripts"));
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_collector_honors_limits() {
        let config = VerifyConfig {
            max_failure_items: 3,
            store_descriptions: false,
        };
        assert_eq!(config.collector().max_items(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(EngineConfig::load("/nonexistent/triplog.yml").is_err());
    }
}
