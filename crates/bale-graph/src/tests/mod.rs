//! Scenario tests for the module graph.
//!
//! Every test drives a `ModuleGraph` over a `MemoryFileStore`, so they are
//! deterministic and never touch the disk.


use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::transform::{ImportScanner, SourceFile, TransformPipeline, TransformResult, Transformer};
use crate::{MemoryFileStore, ModuleGraph, ModuleId};

pub(crate) const ROOT: &str = "/project";

/// Import scanner that counts how often each file was transformed.
#[derive(Default)]
pub(crate) struct CountingScanner {
    inner: ImportScanner,
    counts: Mutex<FxHashMap<PathBuf, usize>>,
}

impl CountingScanner {
    pub(crate) fn count(&self, path: &str) -> usize {
        self.counts.lock().get(Path::new(path)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transformer for CountingScanner {
    fn name(&self) -> &str {
        "counting-scan"
    }

    async fn transform(&self, file: SourceFile<'_>) -> TransformResult {
        *self
            .counts
            .lock()
            .entry(file.path.to_path_buf())
            .or_default() += 1;
        // Yield so concurrent compiles actually interleave.
        tokio::task::yield_now().await;
        self.inner.transform(file).await
    }
}

pub(crate) fn id(path: &str) -> ModuleId {
    ModuleId::new(path).unwrap()
}

pub(crate) fn graph_with(
    store: &MemoryFileStore,
    entries: &[&str],
) -> (ModuleGraph, Arc<CountingScanner>) {
    let scanner = Arc::new(CountingScanner::default());
    let mut pipeline = TransformPipeline::new();
    pipeline.push(scanner.clone());
    let graph = ModuleGraph::builder(Arc::new(store.clone()), ROOT)
        .entries(entries.iter().copied())
        .pipeline(pipeline)
        .build()
        .unwrap();
    (graph, scanner)
}

pub(crate) fn ids(modules: &[Arc<crate::Module>]) -> Vec<String> {
    modules.iter().map(|m| m.id.to_string()).collect()
}
