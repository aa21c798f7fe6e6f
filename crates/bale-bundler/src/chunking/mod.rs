//! Partitioning the module graph into chunks.

mod commons;

pub use commons::CommonsChunk;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bale_config::ChunkStrategy;
use bale_graph::{Module, ModuleGraph, ModuleId};

use crate::chunk::{Chunk, ChunkId, ChunkMapping, ImportRequest};
use crate::Result;

/// Rewrites the chunk list after partitioning. May edit chunks in place,
/// insert new ones through [`ChunkBuilder::chunk`] or replace the list.
pub trait ChunkTransformer: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, chunks: &mut Vec<Chunk>, builder: &ChunkBuilder) -> Result<()>;
}

/// Creates chunks with unique ids and partitions a graph into them.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    next_id: AtomicU32,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new chunk with the given entries and member files.
    pub fn chunk(
        &self,
        entries: Vec<ImportRequest>,
        files: impl IntoIterator<Item = Arc<Module>>,
    ) -> Chunk {
        let mut chunk = Chunk::new(ChunkId::new(self.next_id.fetch_add(1, Ordering::Relaxed)));
        chunk.entries = entries;
        for file in files {
            chunk.add_file(file);
        }
        chunk
    }

    /// Split the graph's entry closures into chunks.
    ///
    /// `Single` puts every entry and everything reachable into one chunk.
    /// `PerEntry` makes one chunk per entry; modules reachable from several
    /// entries appear in each of them until a transformer such as
    /// [`CommonsChunk`] extracts them.
    pub fn partition(&self, graph: &ModuleGraph, strategy: ChunkStrategy) -> Result<Vec<Chunk>> {
        let entries = graph.entries();
        let request = |id: &ModuleId| ImportRequest::resolved(graph.paths().public_path(id), id.clone());

        let chunks = match strategy {
            ChunkStrategy::Single => {
                let files = graph.get_all_module_imports()?;
                vec![self.chunk(entries.iter().map(request).collect(), files)]
            }
            ChunkStrategy::PerEntry => entries
                .iter()
                .map(|entry| -> Result<Chunk> {
                    let files = graph.get_module_imports(entry)?;
                    Ok(self.chunk(vec![request(entry)], files))
                })
                .collect::<Result<Vec<_>>>()?,
        };
        tracing::debug!(chunks = chunks.len(), ?strategy, "partitioned graph");
        Ok(chunks)
    }

    /// Run every transformer in order over `chunks`.
    pub fn transform(
        &self,
        chunks: &mut Vec<Chunk>,
        transformers: &[Arc<dyn ChunkTransformer>],
    ) -> Result<()> {
        for transformer in transformers {
            transformer.transform(chunks, self)?;
            tracing::debug!(
                transformer = transformer.name(),
                chunks = chunks.len(),
                "chunk transformer finished"
            );
        }
        Ok(())
    }
}

/// Record, for every chunk, which of its entries are generated elsewhere.
pub fn compute_mappings(chunks: &mut [Chunk]) {
    let owners: Vec<(ChunkId, Vec<ModuleId>)> = chunks
        .iter()
        .map(|chunk| (chunk.id, chunk.files.keys().cloned().collect()))
        .collect();

    for chunk in chunks.iter_mut() {
        let mut mappings = Vec::new();
        for entry in &chunk.entries {
            let Some(module) = &entry.resolved else {
                continue;
            };
            if chunk.files.contains_key(module) {
                continue;
            }
            let owner = owners
                .iter()
                .find(|(id, files)| *id != chunk.id && files.contains(module));
            if let Some((owner, _)) = owner {
                mappings.push(ChunkMapping {
                    module: module.clone(),
                    chunk: *owner,
                });
            }
        }
        chunk.mappings = mappings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str) -> Arc<Module> {
        Arc::new(Module::new(ModuleId::new(path).unwrap(), ""))
    }

    #[test]
    fn chunk_ids_are_unique_per_builder() {
        let builder = ChunkBuilder::new();
        let a = builder.chunk(vec![], []);
        let b = builder.chunk(vec![], []);
        assert_ne!(a.id, b.id);
        assert_eq!(ChunkBuilder::new().chunk(vec![], []).id, a.id);
    }

    #[test]
    fn mappings_point_at_the_owning_chunk() {
        let builder = ChunkBuilder::new();
        let a = module("/p/a.js");
        let owner = builder.chunk(vec![], [a.clone()]);
        let entry = ImportRequest::resolved("$root/a.js", a.id.clone());
        let local = ImportRequest::resolved("$root/b.js", ModuleId::new("/p/b.js").unwrap());
        let loader = builder.chunk(vec![entry, local], [module("/p/b.js")]);

        let mut chunks = vec![loader, owner];
        compute_mappings(&mut chunks);

        assert_eq!(
            chunks[0].mappings,
            vec![ChunkMapping {
                module: a.id.clone(),
                chunk: chunks[1].id,
            }]
        );
        assert!(chunks[1].mappings.is_empty());
    }
}
