//! Chunk model.
//!
//! A [`Chunk`] is a set of compiled modules that is serialized into one
//! output file. Modules are shared with the graph by `Arc`; a chunk never
//! copies module contents.

use std::fmt;
use std::sync::Arc;

use bale_graph::{Module, ModuleId};
use indexmap::IndexMap;

/// Opaque chunk identifier, unique per [`ChunkBuilder`](crate::ChunkBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request plus its resolution state. Only resolved requests can be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub request: String,
    pub resolved: Option<ModuleId>,
}

impl ImportRequest {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            resolved: None,
        }
    }

    /// A request that is already resolved to `id`.
    pub fn resolved(request: impl Into<String>, id: ModuleId) -> Self {
        Self {
            request: request.into(),
            resolved: Some(id),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// An entry module that lives in another chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMapping {
    pub module: ModuleId,
    pub chunk: ChunkId,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    /// Requests required once the chunk is loaded, in order.
    pub entries: Vec<ImportRequest>,
    /// Synthetic requests for the files a chunk was built around.
    pub imports: Vec<ImportRequest>,
    /// Member modules in generation order.
    pub files: IndexMap<ModuleId, Arc<Module>>,
    /// Entries of this chunk whose module is generated in another chunk.
    pub mappings: Vec<ChunkMapping>,
}

impl Chunk {
    pub(crate) fn new(id: ChunkId) -> Self {
        Self {
            id,
            entries: Vec::new(),
            imports: Vec::new(),
            files: IndexMap::new(),
            mappings: Vec::new(),
        }
    }

    /// Output file name, `<id>.js`.
    pub fn output_name(&self) -> String {
        format!("{}.js", self.id)
    }

    pub fn add_file(&mut self, module: Arc<Module>) {
        self.files.insert(module.id.clone(), module);
    }

    /// Remove a member file. Returns `false` if it was not a member.
    pub fn delete_file(&mut self, id: &ModuleId) -> bool {
        self.files.shift_remove(id).is_some()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.files.contains_key(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.files.values()
    }
}
