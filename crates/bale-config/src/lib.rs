//! Configuration for the bale bundler.
//!
//! [`BaleConfig`] is plain serde data. Build it from JSON with
//! [`BaleConfig::from_value`], discover it on disk with [`ConfigDiscovery`]
//! or layer defaults, files and `BALE_*` environment variables with
//! [`BaleConfig::load_layered`].

pub mod config;
pub mod discovery;
pub mod error;
mod helpers;
pub mod options;
pub mod settings;
pub mod validation;

pub use config::{BaleConfig, ENV_PREFIX};
pub use error::{ConfigError, Result};
pub use options::{
    ChunkStrategy, ChunkingOptions, GeneratorOptions, InstallConfig, PathType, ResolveOptions,
    SourceMapPath, WatchConfig,
};
pub use settings::GlobalSettings;

pub use discovery::{CONFIG_FILE, ConfigDiscovery, PACKAGE_FIELD, discover};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
