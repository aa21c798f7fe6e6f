//! Option groups nested under [`BaleConfig`](crate::BaleConfig).

use serde::{Deserialize, Serialize};

use crate::helpers::{
    default_debounce_ms, default_extensions, default_install_command, default_install_exclude,
    default_namespace, default_true, default_watch_ignored, default_wrapper,
};

/// How generated module ids look at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// `$root/src/index.js`
    #[default]
    FilePath,
    /// Small integers assigned on first sight. Stable for the bundler's lifetime.
    Number,
}

/// Where the merged source map goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapPath {
    /// Appended to the bundle as a base64 `sourceMappingURL` comment.
    Inline,
    /// Written next to the bundle as `<name>.map`.
    #[default]
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// `normal` for the built-in runtime, otherwise a path to a custom runtime file.
    #[serde(default = "default_wrapper")]
    pub wrapper: String,

    #[serde(default)]
    pub source_map: bool,

    #[serde(default)]
    pub source_map_path: SourceMapPath,

    #[serde(default)]
    pub path_type: PathType,

    #[serde(default = "default_namespace")]
    pub source_namespace: String,

    #[serde(default = "default_namespace")]
    pub source_map_namespace: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            wrapper: default_wrapper(),
            source_map: false,
            source_map_path: SourceMapPath::default(),
            path_type: PathType::default(),
            source_namespace: default_namespace(),
            source_map_namespace: default_namespace(),
        }
    }
}

/// How modules are partitioned into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// One chunk holding every entry.
    #[default]
    Single,
    /// One chunk per entry.
    PerEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    #[serde(default)]
    pub strategy: ChunkStrategy,

    /// Move modules shared between chunks into a common chunk.
    #[serde(default)]
    pub commons: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub save: bool,

    #[serde(default)]
    pub silent: bool,

    /// Regexes matched against the importer's path relative to the root.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default = "default_install_exclude")]
    pub exclude: Vec<String>,

    #[serde(default = "default_install_command")]
    pub command: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            save: false,
            silent: false,
            include: Vec::new(),
            exclude: default_install_exclude(),
            command: default_install_command(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Extensions probed for extensionless requests, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub install: InstallConfig,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            install: InstallConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Glob patterns for paths whose changes are ignored.
    #[serde(default = "default_watch_ignored")]
    pub ignored: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Regenerate the bundle after each successful recompile.
    #[serde(default = "default_true")]
    pub generate: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignored: default_watch_ignored(),
            debounce_ms: default_debounce_ms(),
            generate: true,
        }
    }
}
