//! # bale-graph
//!
//! Incremental module graph for the bale bundler.
//!
//! This crate owns everything between a file on disk and a compiled module in
//! the registry:
//!
//! - [`FileStore`] abstracts the filesystem ([`NativeFileStore`],
//!   [`MemoryFileStore`]) and [`PathMapper`] converts between module ids,
//!   filesystem paths and `$root/...` public paths.
//! - [`TransformPipeline`] runs [`Transformer`] plugins in order. The default
//!   pipeline only has the oxc-based [`ImportScanner`].
//! - [`ResolutionLayer`] asks [`Resolver`] plugins to turn requests into
//!   [`ModuleId`]s and dedupes side-effecting attempts such as installing a
//!   missing package ([`InstallResolver`]).
//! - [`ModuleGraph`] ties it together: `compile`, `read`, `push`, rollback on
//!   failure, garbage collection and lifecycle [`Hooks`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bale_graph::{ModuleGraph, NativeFileStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = ModuleGraph::builder(Arc::new(NativeFileStore::new()), "/path/to/project")
//!     .entry("./src/index.js")
//!     .build()?;
//!
//! graph.compile().await?;
//! for module in graph.get_all_module_imports()? {
//!     println!("{} -> {:?}", module.id, module.imports);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! `ModuleGraph` and `ResolutionLayer` are cheap `Arc` handles. State lives
//! in the instance; two graphs never share a registry or a lock map.

pub mod error;
pub mod graph;
pub mod hooks;
pub mod module;
pub mod module_id;
pub mod paths;
pub mod resolve;
pub mod store;
pub mod transform;

#[cfg(test)]
mod tests;

pub use error::{CompileError, ResolveError};
pub use graph::{GraphBuilder, Missing, ModuleGraph, Traversal};
pub use hooks::{CompileEvent, HookId, Hooks};
pub use module::Module;
pub use module_id::{ModuleId, ModuleIdError};
pub use paths::{PathMapper, ROOT_TOKEN};
pub use resolve::{
    CommandInstaller, FsResolver, InstallOptions, InstallResolver, Installer, ResolutionLayer,
    ResolveContext, Resolver,
};
pub use store::{
    FileMetadata, FileStore, MemoryFileStore, NativeFileStore, StoreError, StoreResult,
    ensure_dir,
};
pub use transform::{
    ImportScanner, SourceFile, TransformError, TransformOutput, TransformPipeline, TransformResult,
    Transformed, Transformer,
};

pub use oxc_sourcemap::SourceMap;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, CompileError>;
