#![cfg_attr(docsrs, feature(doc_cfg))]

//! # bale-bundler
//!
//! Chunking, code generation and watch mode on top of [`bale_graph`].
//!
//! A [`Bundler`] is built from a [`BaleConfig`]: it wires a file store, the
//! transform pipeline and the resolution layer into a [`ModuleGraph`], then
//! partitions the compiled graph into [`Chunk`]s, runs [`ChunkTransformer`]s
//! (such as [`CommonsChunk`]) and serializes every chunk with a
//! [`Generator`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use bale_bundler::{BaleConfig, Bundler, PluginRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BaleConfig::load_layered(".")?;
//! let bundler = Bundler::from_config(config, &PluginRegistry::default())?;
//!
//! let output = bundler.build().await?;
//! bundler.write(&output, true)?;
//! # Ok(()) }
//! ```
//!
//! ### Watch mode
//!
//! ```no_run
//! use bale_bundler::{BaleConfig, Bundler, PluginRegistry, WatchOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundler = Bundler::from_config(BaleConfig::load_layered(".")?, &PluginRegistry::default())?;
//! bundler.build().await?;
//!
//! let mut watcher = bundler.watch(WatchOptions::default().on_error(|err| eprintln!("{err}")))?;
//! tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//! watcher.dispose().await;
//! # Ok(()) }
//! ```

// Re-export everything from the graph crate
pub use bale_graph::*;

pub use bale_config::{BaleConfig, ChunkStrategy, ConfigError, PathType, SourceMapPath};

pub mod bundler;
pub mod chunk;
pub mod chunking;
pub mod generator;
pub mod output;
pub mod plugins;
pub mod watch;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use bundler::{BuildOutput, Bundler};
pub use chunk::{Chunk, ChunkId, ChunkMapping, ImportRequest};
pub use chunking::{ChunkBuilder, ChunkTransformer, CommonsChunk};
pub use generator::{
    Bundle, DefaultGenerator, GenerateContext, Generator, GeneratorConfig, PublicPaths,
    RUNTIME_GLOBAL, Wrapper, line_count,
};
pub use output::writer::write_bundles_to;
pub use plugins::{PluginKind, PluginRegistry};
pub use watch::{WatchLoop, WatchOptions, WatchState};

/// Error types for bale-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The module graph failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A chunk entry was never resolved to a module.
    #[error("Entry '{request}' was not resolved")]
    Consistency { request: String },

    /// Generating a chunk failed.
    #[error("Generation failed: {0}")]
    Generate(String),

    /// The filesystem watcher failed.
    #[error("Watch error: {0}")]
    Watch(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loading or validating configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// Output file already exists and overwrite is disabled.
    #[error("Output exists: {0}")]
    OutputExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bale-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err.to_string())
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Compile(_) => "COMPILE_ERROR",
            Error::Consistency { .. } => "CONSISTENCY_ERROR",
            Error::Generate(_) => "GENERATE_ERROR",
            Error::Watch(_) => "WATCH_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Config(_) => "CONFIG_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::OutputExists(_) => "OUTPUT_EXISTS",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Compile(CompileError::Resolve(ResolveError::NotFound { request, .. })) => {
                Some(Box::new(format!(
                    "Check that '{}' exists, or enable resolve.install to install missing packages.",
                    request
                )))
            }
            Error::Compile(CompileError::Transform { plugin, .. }) => Some(Box::new(format!(
                "The '{}' transformer rejected this file. Fix the syntax error and save again.",
                plugin
            ))),
            Error::Consistency { request } => Some(Box::new(format!(
                "'{}' is listed as an entry but no module was resolved for it. Run compile() before generating.",
                request
            ))),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {}",
                msg
            ))),
            Error::Config(err) => err.hint().map(|h| Box::new(h) as Box<dyn std::fmt::Display + '_>),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the output directory and doesn't contain '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            Error::OutputExists(msg) => Some(Box::new(format!(
                "Output file already exists: {}\nPass overwrite = true to replace existing files.",
                msg
            ))),
            _ => None,
        }
    }
}
