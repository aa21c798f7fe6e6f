//! Plugin lookup for bale-bundler.
//!
//! Plugins are capability-typed: [`Transformer`](bale_graph::Transformer)
//! and [`Resolver`](bale_graph::Resolver) come from the graph crate,
//! [`ChunkTransformer`](crate::ChunkTransformer) and
//! [`Generator`](crate::Generator) from this one.

pub mod registry;

pub use registry::{PluginKind, PluginRegistry, ResolvedPlugins};
