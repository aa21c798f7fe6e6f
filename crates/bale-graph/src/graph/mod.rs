//! Incremental module graph
//!
//! [`ModuleGraph`] owns the registry of compiled modules. It reads files
//! through the [`FileStore`], runs them through the [`TransformPipeline`],
//! resolves their imports with the [`ResolutionLayer`] and recursively makes
//! sure every import is compiled too.
//!
//! # Consistency
//!
//! A module is staged in the registry before its imports are read, which is
//! what makes cycles terminate: when the walk comes back around, the module
//! is already present. If any import fails, the staged module is rolled back
//! to its previous version (or removed), so a failed recompile leaves the
//! registry as it was for that module. Siblings that compiled fine stay,
//! unless they import a module that was rolled back; those are reverted too.
//!
//! Concurrent reads of the same module share one in-flight read, so a module
//! imported from two places at once is transformed once.

mod traversal;

pub use traversal::{Missing, Traversal};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::CompileError;
use crate::hooks::{CompileEvent, Hooks};
use crate::module::Module;
use crate::module_id::{ModuleId, ModuleIdError};
use crate::paths::PathMapper;
use crate::resolve::{FsResolver, ResolutionLayer, Resolver};
use crate::store::FileStore;
use crate::transform::{ImportScanner, TransformPipeline};
use traversal::Registry;

type PendingRead = Shared<BoxFuture<'static, Result<Vec<Committed>, CompileError>>>;

/// A module committed by one push, with the version it replaced.
#[derive(Clone)]
struct Committed {
    id: ModuleId,
    module: Arc<Module>,
    previous: Option<Arc<Module>>,
}

impl Committed {
    fn is_current(&self, registry: &Registry) -> bool {
        registry
            .get(&self.id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.module))
    }

    fn is_dangling(&self, registry: &Registry) -> bool {
        self.module
            .imports
            .iter()
            .any(|import| !registry.contains_key(import))
    }

    /// Put the previous version back, or remove the module if it is new.
    /// Does nothing once something else replaced it.
    fn revert(&self, registry: &mut Registry) {
        if !self.is_current(registry) {
            return;
        }
        match &self.previous {
            Some(previous) => {
                tracing::debug!(id = %self.id, "rolling back to previous version");
                registry.insert(self.id.clone(), previous.clone());
            }
            None => {
                tracing::debug!(id = %self.id, "rolling back staged module");
                registry.shift_remove(&self.id);
            }
        }
    }
}

struct GraphInner {
    store: Arc<dyn FileStore>,
    paths: PathMapper,
    entries: RwLock<Vec<ModuleId>>,
    pipeline: TransformPipeline,
    resolver: ResolutionLayer,
    hooks: Hooks,
    registry: RwLock<Registry>,
    in_flight: Mutex<FxHashMap<ModuleId, PendingRead>>,
}

/// The compilation core. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ModuleGraph {
    inner: Arc<GraphInner>,
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("root", &self.inner.paths.root())
            .field("entries", &*self.inner.entries.read())
            .field("modules", &self.inner.registry.read().len())
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

/// Builder for [`ModuleGraph`].
pub struct GraphBuilder {
    store: Arc<dyn FileStore>,
    root: PathBuf,
    entries: Vec<PathBuf>,
    pipeline: Option<TransformPipeline>,
    resolvers: Option<Vec<Arc<dyn Resolver>>>,
    resolver: Option<ResolutionLayer>,
}

impl GraphBuilder {
    pub fn entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn entries<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Defaults to a pipeline with only the import scanner.
    pub fn pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Resolvers for a fresh [`ResolutionLayer`]. Defaults to [`FsResolver`].
    pub fn resolvers(mut self, resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    /// Use an existing layer (and its locks) instead of building one.
    pub fn resolution_layer(mut self, layer: ResolutionLayer) -> Self {
        self.resolver = Some(layer);
        self
    }

    pub fn build(self) -> Result<ModuleGraph, ModuleIdError> {
        let paths = PathMapper::new(self.root);
        let entries = self
            .entries
            .iter()
            .map(|entry| paths.to_id(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let resolver = match self.resolver {
            Some(layer) => layer,
            None => ResolutionLayer::new(
                self.store.clone(),
                paths.root(),
                self.resolvers.unwrap_or_else(|| {
                    vec![Arc::new(FsResolver::default()) as Arc<dyn Resolver>]
                }),
            ),
        };
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| TransformPipeline::new().with(ImportScanner::new()));

        Ok(ModuleGraph {
            inner: Arc::new(GraphInner {
                store: self.store,
                paths,
                entries: RwLock::new(entries),
                pipeline,
                resolver,
                hooks: Hooks::new(),
                registry: RwLock::new(IndexMap::new()),
                in_flight: Mutex::new(FxHashMap::default()),
            }),
        })
    }
}

impl ModuleGraph {
    pub fn builder(store: Arc<dyn FileStore>, root: impl Into<PathBuf>) -> GraphBuilder {
        GraphBuilder {
            store,
            root: root.into(),
            entries: Vec::new(),
            pipeline: None,
            resolvers: None,
            resolver: None,
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.paths.root()
    }

    pub fn paths(&self) -> &PathMapper {
        &self.inner.paths
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.inner.store
    }

    pub fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    pub fn resolution_layer(&self) -> &ResolutionLayer {
        &self.inner.resolver
    }

    pub fn entries(&self) -> Vec<ModuleId> {
        self.inner.entries.read().clone()
    }

    pub fn set_entries<I, P>(&self, entries: I) -> Result<(), ModuleIdError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let ids = entries
            .into_iter()
            .map(|entry| self.inner.paths.to_id(entry))
            .collect::<Result<Vec<_>, _>>()?;
        *self.inner.entries.write() = ids;
        Ok(())
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<Module>> {
        self.inner.registry.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.inner.registry.read().contains_key(id)
    }

    /// Whether the file at `path` is part of the graph.
    pub fn contains_path(&self, path: impl AsRef<Path>) -> bool {
        self.inner
            .paths
            .to_id(path)
            .map(|id| self.contains(&id))
            .unwrap_or(false)
    }

    /// Every registered module, in registration order.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.inner.registry.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }

    /// Resolve `request` through the graph's resolution layer.
    pub async fn resolve(
        &self,
        request: &str,
        from: Option<&ModuleId>,
    ) -> Result<ModuleId, CompileError> {
        Ok(self.inner.resolver.resolve(request, from).await?)
    }

    /// Read every entry concurrently.
    ///
    /// All entries are given the chance to finish; the first failure (in
    /// entry order) is returned and the others are logged. Entries that
    /// compiled stay committed.
    pub async fn compile(&self) -> Result<(), CompileError> {
        let entries = self.entries();
        tracing::debug!(entries = entries.len(), "compiling");

        let results = join_all(entries.into_iter().map(|id| self.read_id(id))).await;

        let mut first = None;
        for result in results {
            if let Err(err) = result {
                if first.is_none() {
                    first = Some(err);
                } else {
                    tracing::warn!(error = %err, "additional entry failed to compile");
                }
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Load `path` from the store and push it.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let id = self.inner.paths.to_id(path)?;
        self.read_id(id).await
    }

    async fn read_id(&self, id: ModuleId) -> Result<(), CompileError> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            self.pending_read(&mut in_flight, id)
        };
        pending.await.map(|_| ())
    }

    /// Join the in-flight read for `id` or start one.
    fn pending_read(
        &self,
        in_flight: &mut FxHashMap<ModuleId, PendingRead>,
        id: ModuleId,
    ) -> PendingRead {
        if let Some(existing) = in_flight.get(&id) {
            tracing::trace!(id = %id, "joining in-flight read");
            return existing.clone();
        }

        let graph = self.clone();
        let key = id.clone();
        let pending = async move {
            let result = graph.load_and_push(key.clone()).await;
            graph.inner.in_flight.lock().remove(&key);
            result
        }
        .boxed()
        .shared();
        in_flight.insert(id, pending.clone());
        pending
    }

    async fn load_and_push(&self, id: ModuleId) -> Result<Vec<Committed>, CompileError> {
        let path = self.inner.paths.to_path(&id);
        let contents = self
            .inner
            .store
            .read_file(&path)
            .await
            .map_err(|err| CompileError::read(&path, &err))?;
        self.push_id(id, contents).await
    }

    /// Compile `contents` as the new source of `path`.
    ///
    /// Pushing the same raw contents again is a no-op.
    pub async fn push(
        &self,
        path: impl AsRef<Path>,
        contents: impl Into<String>,
    ) -> Result<(), CompileError> {
        let id = self.inner.paths.to_id(path)?;
        self.push_id(id, contents.into()).await.map(|_| ())
    }

    /// Returns this module and every module committed by the reads it
    /// started or joined.
    async fn push_id(
        &self,
        id: ModuleId,
        contents: String,
    ) -> Result<Vec<Committed>, CompileError> {
        let old = self.get(&id);
        if old.as_ref().is_some_and(|module| module.sources == contents) {
            tracing::trace!(id = %id, "contents unchanged, skipping");
            return Ok(Vec::new());
        }

        let mut event = CompileEvent {
            id: id.clone(),
            contents: contents.clone(),
            source_map: None,
            imports: Vec::new(),
            old_module: old.clone(),
        };
        self.inner.hooks.emit_before_compile(&mut event);

        let public_path = self.inner.paths.public_path(&id);
        let transformed = self
            .inner
            .pipeline
            .run(id.as_path(), &event.contents, &public_path)
            .await?;

        let imports = self.resolve_imports(&id, &transformed.imports).await?;
        let requests: Vec<(String, ModuleId)> = transformed
            .imports
            .iter()
            .cloned()
            .zip(imports.iter().cloned())
            .collect();

        event.contents = transformed.contents;
        event.source_map = transformed.source_map;
        event.imports = imports;
        self.inner.hooks.emit_after_compile(&mut event);
        self.inner
            .hooks
            .emit_did_compile(Arc::new(event.clone()))
            .await;

        let module = Arc::new(
            Module {
                id: id.clone(),
                sources: contents,
                contents: event.contents,
                source_map: event.source_map.map(Arc::new),
                imports: Vec::new(),
                requests: IndexMap::new(),
            }
            .with_imports(event.imports)
            .with_requests(requests),
        );
        tracing::debug!(id = %id, imports = module.imports.len(), "push");

        // Stage, then collect what still has to be read, atomically with
        // respect to other reads deciding the same thing.
        let pending: Vec<PendingRead> = {
            let mut in_flight = self.inner.in_flight.lock();
            self.inner
                .registry
                .write()
                .insert(id.clone(), module.clone());

            let registry = self.inner.registry.read();
            let missing: Vec<ModuleId> = module
                .imports
                .iter()
                .filter(|import| !registry.contains_key(*import))
                .cloned()
                .collect();
            drop(registry);

            missing
                .into_iter()
                .map(|import| self.pending_read(&mut in_flight, import))
                .collect()
        };

        let results = join_all(pending).await;
        let mut committed = vec![Committed {
            id,
            module: module.clone(),
            previous: old.clone(),
        }];
        let mut failure = None;
        for result in results {
            match result {
                Ok(mut descendants) => committed.append(&mut descendants),
                Err(err) if failure.is_none() => failure = Some(err),
                Err(_) => {}
            }
        }
        if let Some(err) = failure {
            self.rollback(&committed);
            return Err(err);
        }

        if let Some(old) = old {
            if old.imports_changed(&module) {
                self.garbage_collect();
            }
        }
        Ok(committed)
    }

    async fn resolve_imports(
        &self,
        from: &ModuleId,
        requests: &[String],
    ) -> Result<Vec<ModuleId>, CompileError> {
        let results = join_all(
            requests
                .iter()
                .map(|request| self.inner.resolver.resolve(request, Some(from))),
        )
        .await;

        let mut imports = Vec::with_capacity(results.len());
        for result in results {
            imports.push(result?);
        }
        Ok(imports)
    }

    /// Revert the failed module, then every module committed under it
    /// that now imports something missing, until nothing changes. A
    /// cycle back into the failed module is the usual way to get there.
    fn rollback(&self, committed: &[Committed]) {
        let Some((failed, descendants)) = committed.split_first() else {
            return;
        };
        let mut registry = self.inner.registry.write();
        failed.revert(&mut registry);

        loop {
            let mut changed = false;
            for commit in descendants.iter().rev() {
                if commit.is_current(&registry) && commit.is_dangling(&registry) {
                    commit.revert(&mut registry);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Every module reachable from the entries, depth-first in import order.
    pub fn get_all_module_imports(&self) -> Result<Vec<Arc<Module>>, CompileError> {
        let entries = self.entries();
        let registry = self.inner.registry.read();
        let mut traversal = Traversal::new(&registry, Missing::Error);
        for entry in &entries {
            traversal.visit(entry)?;
        }
        Ok(traversal.into_modules())
    }

    /// Every module reachable from `id`, starting with `id` itself.
    pub fn get_module_imports(&self, id: &ModuleId) -> Result<Vec<Arc<Module>>, CompileError> {
        let registry = self.inner.registry.read();
        let mut traversal = Traversal::new(&registry, Missing::Error);
        traversal.visit(id)?;
        Ok(traversal.into_modules())
    }

    /// Remove every module that is unreachable from the entries.
    ///
    /// Returns the removed ids.
    pub fn garbage_collect(&self) -> Vec<ModuleId> {
        let entries = self.entries();
        let mut registry = self.inner.registry.write();

        let reachable = {
            let mut traversal = Traversal::new(&registry, Missing::Skip);
            for entry in &entries {
                // Skip mode never fails.
                let _ = traversal.visit(entry);
            }
            traversal.visited().clone()
        };

        let removed: Vec<ModuleId> = registry
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect();
        for id in &removed {
            registry.shift_remove(id);
        }
        if !removed.is_empty() {
            tracing::debug!(removed = removed.len(), "garbage collected");
        }
        removed
    }

    /// Whether the entries' import closures are complete, i.e. a bundle can
    /// be generated from the registry as it is.
    pub fn needs_generation(&self) -> bool {
        self.get_all_module_imports().is_ok()
    }

    /// Fire `did_destroy`, then drop every module and hook.
    pub fn dispose(&self) {
        self.inner.hooks.emit_did_destroy();
        self.inner.hooks.clear();
        self.inner.registry.write().clear();
        self.inner.in_flight.lock().clear();
    }
}
