//! Top-level configuration structure for bale.
//!
//! For file discovery, see the `discovery` module.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::helpers::{default_output_dir, default_plugins, default_root_directory};
use crate::options::{ChunkingOptions, GeneratorOptions, ResolveOptions, WatchConfig};
use crate::settings::GlobalSettings;

/// Environment variable prefix used by [`BaleConfig::load_layered`].
pub const ENV_PREFIX: &str = "BALE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaleConfig {
    /// Project root. Relative paths are resolved against the config file's directory.
    #[serde(default = "default_root_directory")]
    pub root_directory: PathBuf,

    /// Entry files, relative to the root or `$root/...`.
    #[serde(default)]
    pub entries: Vec<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub generator: GeneratorOptions,

    #[serde(default)]
    pub chunking: ChunkingOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Plugin names, looked up in the bundler's plugin registry.
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Default for BaleConfig {
    fn default() -> Self {
        Self {
            root_directory: default_root_directory(),
            entries: Vec::new(),
            output_dir: default_output_dir(),
            generator: GeneratorOptions::default(),
            chunking: ChunkingOptions::default(),
            resolve: ResolveOptions::default(),
            watch: WatchConfig::default(),
            plugins: default_plugins(),
            settings: GlobalSettings::default(),
        }
    }
}

impl BaleConfig {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use bale_config::BaleConfig;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let value = json!({
    ///     "entries": ["src/index.js"],
    ///     "generator": { "source_map": true }
    /// });
    ///
    /// let config = BaleConfig::from_value(value).unwrap();
    /// assert_eq!(config.entries, vec![PathBuf::from("src/index.js")]);
    /// assert!(config.generator.source_map);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Load configuration from every source under `root`.
    ///
    /// Priority: environment variables > `bale.toml` > `package.json` field `"bale"` > defaults.
    /// Nested keys in the environment are separated by a double underscore:
    /// `BALE_GENERATOR__SOURCE_MAP=true`.
    pub fn load_layered(root: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_layered_with_prefix(root, ENV_PREFIX)
    }

    /// [`load_layered`](Self::load_layered) with a custom environment prefix.
    pub fn load_layered_with_prefix(root: impl AsRef<Path>, prefix: &str) -> ConfigResult<Self> {
        let root = root.as_ref();
        let mut figment = Figment::new().merge(Serialized::defaults(BaleConfig::default()));

        let package_json = root.join("package.json");
        if package_json.is_file() {
            figment = figment.merge(Figment::from(Json::file(&package_json)).focus("bale"));
        }

        let toml_path = root.join("bale.toml");
        if toml_path.is_file() {
            figment = figment.merge(Toml::file(&toml_path));
        }

        figment = figment.merge(Env::prefixed(prefix).split("__"));

        let config: BaleConfig = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: Some(format!("{e}. Check bale.toml syntax and field types")),
        })?;
        tracing::debug!(root = %root.display(), entries = config.entries.len(), "configuration loaded");
        Ok(config.with_base(root))
    }

    /// Resolve a relative `root_directory` against `base`.
    pub fn with_base(mut self, base: &Path) -> Self {
        if self.root_directory.is_relative() {
            self.root_directory = if self.root_directory == Path::new(".") {
                base.to_path_buf()
            } else {
                base.join(&self.root_directory)
            };
        }
        self
    }

    /// Absolute output directory.
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.root_directory.join(&self.output_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ChunkStrategy, PathType, SourceMapPath};
    use serde_json::json;

    #[test]
    fn from_value_creates_config() {
        let value = json!({
            "entries": ["a.js", "b.js"],
            "chunking": { "strategy": "per_entry", "commons": true },
            "generator": { "path_type": "number", "source_map_path": "inline" }
        });

        let config = BaleConfig::from_value(value).unwrap();
        assert_eq!(config.entries.len(), 2);
        assert_eq!(config.chunking.strategy, ChunkStrategy::PerEntry);
        assert!(config.chunking.commons);
        assert_eq!(config.generator.path_type, PathType::Number);
        assert_eq!(config.generator.source_map_path, SourceMapPath::Inline);
        assert_eq!(config.generator.wrapper, "normal");
    }

    #[test]
    fn from_value_reports_bad_enum() {
        let err = BaleConfig::from_value(json!({ "chunking": { "strategy": "lots" } })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "config"));
    }

    #[test]
    fn to_value_serializes_config() {
        let mut config = BaleConfig::default();
        config.generator.source_map = true;

        let value = config.to_value().unwrap();
        assert_eq!(value["generator"]["source_map"], json!(true));
        assert_eq!(value["generator"]["path_type"], json!("file_path"));
    }

    #[test]
    fn with_base_resolves_relative_roots() {
        let base = Path::new("/work/app");
        assert_eq!(BaleConfig::default().with_base(base).root_directory, base);

        let mut nested = BaleConfig::default();
        nested.root_directory = PathBuf::from("web");
        assert_eq!(nested.with_base(base).root_directory, base.join("web"));

        let mut absolute = BaleConfig::default();
        absolute.root_directory = PathBuf::from("/elsewhere");
        assert_eq!(
            absolute.with_base(base).root_directory,
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn output_path_is_under_root() {
        let config = BaleConfig::default().with_base(Path::new("/work/app"));
        assert_eq!(config.output_path(), PathBuf::from("/work/app/dist"));
    }
}
