//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::path::Path;

use regex::Regex;

use crate::config::BaleConfig;
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &BaleConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use bale_config::{BaleConfig, ConfigValidator, SchemaValidator};
///
/// let mut config = BaleConfig::default();
/// config.entries = vec!["index.js".into()];
///
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BaleConfig) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        if config.entries.iter().any(|e| e.as_os_str().is_empty()) {
            return Err(ConfigError::SchemaValidation {
                message: "entry paths cannot be empty".to_string(),
                hint: Some("Remove empty strings from the 'entries' array".to_string()),
            });
        }

        for ext in &config.resolve.extensions {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::SchemaValidation {
                    message: format!("invalid extension '{}'", ext),
                    hint: Some("List extensions without the leading dot, e.g. \"js\"".to_string()),
                });
            }
        }

        let install = &config.resolve.install;
        for pattern in install.include.iter().chain(&install.exclude) {
            if let Err(err) = Regex::new(pattern) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("invalid install filter '{}': {}", pattern, err),
                    hint: Some("'include' and 'exclude' are regular expressions".to_string()),
                });
            }
        }
        if install.enabled && install.command.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "install command cannot be empty".to_string(),
                hint: Some("Set resolve.install.command, e.g. \"npm\"".to_string()),
            });
        }

        for namespace in [
            &config.generator.source_namespace,
            &config.generator.source_map_namespace,
        ] {
            if namespace.is_empty() || namespace.contains('/') {
                return Err(ConfigError::SchemaValidation {
                    message: format!("invalid namespace '{}'", namespace),
                    hint: Some("Namespaces are single path segments such as \"app\"".to_string()),
                });
            }
        }

        if config.plugins.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::SchemaValidation {
                message: "plugin names cannot be empty".to_string(),
                hint: None,
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Runs [`SchemaValidator`] first, then checks that the root directory and
/// every entry exist on disk.
pub struct FsValidator {
    root: std::path::PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BaleConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let root = if config.root_directory.is_absolute() {
            config.root_directory.clone()
        } else {
            self.root.join(&config.root_directory)
        };
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound { path: root });
        }

        for entry in &config.entries {
            let relative = entry.strip_prefix("$root").unwrap_or(entry);
            let path = root.join(relative);
            if !path.is_file() {
                return Err(ConfigError::EntryNotFound { path });
            }
        }

        if let Some(wrapper) = custom_wrapper(config) {
            let path = root.join(wrapper);
            if !path.is_file() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("wrapper not found: {}", path.display()),
                    hint: Some("Use \"normal\" or a path to a runtime file".to_string()),
                });
            }
        }

        Ok(())
    }
}

fn custom_wrapper(config: &BaleConfig) -> Option<&str> {
    let wrapper = config.generator.wrapper.as_str();
    (wrapper != "normal").then_some(wrapper)
}

pub fn validate_schema(config: &BaleConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &BaleConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
