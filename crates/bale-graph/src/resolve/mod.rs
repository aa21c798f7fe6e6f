//! Resolution layer
//!
//! Turns an import request (`./util`, `lodash/map`) into a [`ModuleId`] by
//! asking each registered [`Resolver`] in order; the first one that answers
//! wins.
//!
//! Some resolvers have side effects (installing a missing package). Those go
//! through [`ResolutionLayer::dedupe`]: at most one attempt per key runs at a
//! time, every concurrent caller for that key shares the attempt's outcome,
//! and the lock entry disappears as soon as the attempt settles.

pub mod fs;
pub mod install;

pub use fs::FsResolver;
pub use install::{CommandInstaller, InstallOptions, InstallResolver, Installer};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::ResolveError;
use crate::module_id::ModuleId;
use crate::store::FileStore;

type PendingResolution = Shared<BoxFuture<'static, Result<ModuleId, ResolveError>>>;

/// A resolver plugin.
#[async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve `request` imported from `from` (`None` for entries).
    ///
    /// `Ok(None)` hands the request to the next resolver.
    async fn resolve(
        &self,
        request: &str,
        from: Option<&ModuleId>,
        ctx: &ResolveContext,
    ) -> Result<Option<ModuleId>, ResolveError>;
}

struct LayerInner {
    resolvers: Vec<Arc<dyn Resolver>>,
    store: Arc<dyn FileStore>,
    root: PathBuf,
    locks: Mutex<FxHashMap<String, PendingResolution>>,
}

/// Ordered resolver chain plus the lock map for side-effecting attempts.
///
/// Cloning is cheap; clones share resolvers and locks.
#[derive(Clone)]
pub struct ResolutionLayer {
    inner: Arc<LayerInner>,
}

impl std::fmt::Debug for ResolutionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionLayer")
            .field(
                "resolvers",
                &self
                    .inner
                    .resolvers
                    .iter()
                    .map(|r| r.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("root", &self.inner.root)
            .field("pending", &self.pending_locks())
            .finish()
    }
}

impl ResolutionLayer {
    pub fn new(
        store: Arc<dyn FileStore>,
        root: impl Into<PathBuf>,
        resolvers: Vec<Arc<dyn Resolver>>,
    ) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                resolvers,
                store,
                root: root.into(),
                locks: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.inner.store
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Keys with an attempt still in flight.
    pub fn pending_locks(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner.locks.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Resolve `request` through every resolver.
    pub async fn resolve(
        &self,
        request: &str,
        from: Option<&ModuleId>,
    ) -> Result<ModuleId, ResolveError> {
        self.resolve_skipping(request, from, None).await
    }

    async fn resolve_skipping(
        &self,
        request: &str,
        from: Option<&ModuleId>,
        skip: Option<usize>,
    ) -> Result<ModuleId, ResolveError> {
        for (index, resolver) in self.inner.resolvers.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            let ctx = ResolveContext {
                layer: self.clone(),
                index,
            };
            if let Some(id) = resolver.resolve(request, from, &ctx).await? {
                tracing::trace!(request, resolver = resolver.name(), id = %id, "resolved");
                return Ok(id);
            }
        }

        Err(ResolveError::NotFound {
            request: request.to_string(),
            from: from.cloned(),
        })
    }

    /// Run `attempt` under the lock for `key`.
    ///
    /// If an attempt for `key` is already in flight, its outcome is shared
    /// instead of starting a new one. Before returning, the caller waits for
    /// every attempt that is pending at that moment, so no caller observes
    /// the project while another installation is still writing to it.
    pub async fn dedupe<F>(&self, key: &str, attempt: F) -> Result<ModuleId, ResolveError>
    where
        F: Future<Output = Result<ModuleId, ResolveError>> + Send + 'static,
    {
        let pending = {
            let mut locks = self.inner.locks.lock();
            match locks.get(key) {
                Some(existing) => {
                    tracing::debug!(key, "joining in-flight resolution");
                    existing.clone()
                }
                None => {
                    let weak = Arc::downgrade(&self.inner);
                    let owned_key = key.to_string();
                    let shared = async move {
                        let result = attempt.await;
                        if let Some(inner) = weak.upgrade() {
                            inner.locks.lock().remove(&owned_key);
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    locks.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        let result = pending.await;

        let others: Vec<PendingResolution> = self.inner.locks.lock().values().cloned().collect();
        if !others.is_empty() {
            tracing::debug!(count = others.len(), "waiting for pending resolutions");
            futures::future::join_all(others).await;
        }

        result
    }
}

/// Handle given to a resolver while it runs.
#[derive(Clone)]
pub struct ResolveContext {
    layer: ResolutionLayer,
    index: usize,
}

impl ResolveContext {
    pub fn layer(&self) -> &ResolutionLayer {
        &self.layer
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        self.layer.store()
    }

    pub fn root(&self) -> &Path {
        self.layer.root()
    }

    /// Resolve through every resolver except the one holding this context.
    ///
    /// A resolver uses this to ask "can anyone else find it?" without
    /// recursing into itself.
    pub async fn resolve_others(
        &self,
        request: &str,
        from: Option<&ModuleId>,
    ) -> Result<ModuleId, ResolveError> {
        self.layer
            .resolve_skipping(request, from, Some(self.index))
            .await
    }
}
