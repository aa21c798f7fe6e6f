use std::sync::Arc;

use bale_graph::{Module, ModuleId};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use super::{ChunkBuilder, ChunkTransformer};
use crate::Result;
use crate::chunk::{Chunk, ImportRequest};

/// Moves modules that appear in more than one chunk into a new common chunk.
///
/// The common chunk is prepended and takes over every sibling's entries, so
/// loading it first registers the shared modules and then pulls in the
/// sibling chunks that own the entry modules.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonsChunk;

impl CommonsChunk {
    pub const NAME: &'static str = "commons";
}

impl ChunkTransformer for CommonsChunk {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, chunks: &mut Vec<Chunk>, builder: &ChunkBuilder) -> Result<()> {
        let mut known: FxHashSet<&ModuleId> = FxHashSet::default();
        let mut common: IndexMap<ModuleId, Arc<Module>> = IndexMap::new();

        for chunk in chunks.iter() {
            for (id, module) in &chunk.files {
                if !known.insert(id) {
                    common.entry(id.clone()).or_insert_with(|| module.clone());
                }
            }
        }

        if common.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::new();
        for chunk in chunks.iter_mut() {
            for id in common.keys() {
                chunk.delete_file(id);
            }
            entries.append(&mut chunk.entries);
        }

        let mut shared = builder.chunk(entries, common.values().cloned());
        shared.imports = common
            .keys()
            .map(|id| ImportRequest::resolved(id.path_string(), id.clone()))
            .collect();
        tracing::debug!(
            chunk = %shared.id,
            files = shared.files.len(),
            "extracted common chunk"
        );
        chunks.insert(0, shared);
        Ok(())
    }
}
