//! File-based config discovery
//!
//! Handles finding and loading bale configuration files from the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::BaleConfig;
use crate::error::{ConfigError, Result};

/// Name of the dedicated config file.
pub const CONFIG_FILE: &str = "bale.toml";

/// Field read from `package.json` when no config file exists.
pub const PACKAGE_FIELD: &str = "bale";

/// File-based configuration discovery
///
/// Library users can build a [`BaleConfig`] directly with
/// [`BaleConfig::from_value`]; this is for tools that start from a directory.
///
/// # Example
///
/// ```no_run
/// use bale_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. `bale.toml`
    /// 2. `package.json` with a `bale` field
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed = serde_json::from_str::<Value>(&content).ok()?;
        match parsed.get(PACKAGE_FIELD) {
            Some(field) if !field.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load config from the discovered file.
    ///
    /// A relative `root_directory` is resolved against the discovery root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<BaleConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        tracing::debug!(path = %path.display(), "loading config");
        Ok(self.load_from(&path)?.with_base(&self.root))
    }

    fn load_from(&self, path: &Path) -> Result<BaleConfig> {
        if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            return self.load_from_package_json(path);
        }

        let content = fs::read_to_string(path)?;

        let toml_val: toml::Value =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "toml".to_string(),
                hint: Some(format!("Invalid TOML syntax: {}", e)),
            })?;

        let value = serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("TOML to JSON conversion failed: {}", e)),
        })?;

        BaleConfig::from_value(value)
    }

    fn load_from_package_json(&self, path: &Path) -> Result<BaleConfig> {
        let content = fs::read_to_string(path)?;

        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: Some(format!("Invalid JSON: {}", e)),
            })?;

        match parsed.get(PACKAGE_FIELD) {
            Some(value) if !value.is_null() => BaleConfig::from_value(value.clone()),
            _ => Err(ConfigError::InvalidValue {
                field: PACKAGE_FIELD.to_string(),
                hint: Some("Add a 'bale' field to your package.json".to_string()),
            }),
        }
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<BaleConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}
