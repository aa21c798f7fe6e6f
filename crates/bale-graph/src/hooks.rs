//! Compile lifecycle hooks.
//!
//! Callbacks run in registration order. `before_compile` and `after_compile`
//! are synchronous and may edit the event in place (e.g. to minify the
//! compiled contents). `did_compile` callbacks are asynchronous and awaited
//! one after another; they only observe.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use oxc_sourcemap::SourceMap;
use parking_lot::RwLock;

use crate::module::Module;
use crate::module_id::ModuleId;

/// Data passed to compile hooks.
#[derive(Debug, Clone)]
pub struct CompileEvent {
    pub id: ModuleId,
    /// Raw contents before the pipeline runs, compiled contents afterwards.
    pub contents: String,
    pub source_map: Option<SourceMap>,
    /// Resolved imports. Always empty in `before_compile`.
    pub imports: Vec<ModuleId>,
    /// The module being replaced, if any.
    pub old_module: Option<Arc<Module>>,
}

/// Handle returned by every registration, used to remove the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type SyncHook = Arc<dyn Fn(&mut CompileEvent) + Send + Sync>;
type AsyncHook = Arc<dyn Fn(Arc<CompileEvent>) -> BoxFuture<'static, ()> + Send + Sync>;
type DestroyHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    next_id: AtomicU64,
    before_compile: RwLock<Vec<(HookId, SyncHook)>>,
    after_compile: RwLock<Vec<(HookId, SyncHook)>>,
    did_compile: RwLock<Vec<(HookId, AsyncHook)>>,
    did_destroy: RwLock<Vec<(HookId, DestroyHook)>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_compile", &self.before_compile.read().len())
            .field("after_compile", &self.after_compile.read().len())
            .field("did_compile", &self.did_compile.read().len())
            .field("did_destroy", &self.did_destroy.read().len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_before_compile(
        &self,
        callback: impl Fn(&mut CompileEvent) + Send + Sync + 'static,
    ) -> HookId {
        let id = self.next();
        self.before_compile.write().push((id, Arc::new(callback)));
        id
    }

    pub fn on_after_compile(
        &self,
        callback: impl Fn(&mut CompileEvent) + Send + Sync + 'static,
    ) -> HookId {
        let id = self.next();
        self.after_compile.write().push((id, Arc::new(callback)));
        id
    }

    pub fn on_did_compile<F>(&self, callback: F) -> HookId
    where
        F: Fn(Arc<CompileEvent>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let id = self.next();
        self.did_compile.write().push((id, Arc::new(callback)));
        id
    }

    pub fn on_did_destroy(&self, callback: impl Fn() + Send + Sync + 'static) -> HookId {
        let id = self.next();
        self.did_destroy.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was already gone.
    pub fn remove(&self, id: HookId) -> bool {
        fn drop_from<T>(list: &RwLock<Vec<(HookId, T)>>, id: HookId) -> bool {
            let mut list = list.write();
            let before = list.len();
            list.retain(|(hook, _)| *hook != id);
            list.len() != before
        }

        drop_from(&self.before_compile, id)
            || drop_from(&self.after_compile, id)
            || drop_from(&self.did_compile, id)
            || drop_from(&self.did_destroy, id)
    }

    pub fn clear(&self) {
        self.before_compile.write().clear();
        self.after_compile.write().clear();
        self.did_compile.write().clear();
        self.did_destroy.write().clear();
    }

    pub(crate) fn emit_before_compile(&self, event: &mut CompileEvent) {
        let callbacks: Vec<SyncHook> =
            self.before_compile.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) fn emit_after_compile(&self, event: &mut CompileEvent) {
        let callbacks: Vec<SyncHook> =
            self.after_compile.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) async fn emit_did_compile(&self, event: Arc<CompileEvent>) {
        let callbacks: Vec<AsyncHook> =
            self.did_compile.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event.clone()).await;
        }
    }

    pub(crate) fn emit_did_destroy(&self) {
        let callbacks: Vec<DestroyHook> =
            self.did_destroy.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use parking_lot::Mutex;

    fn event() -> CompileEvent {
        CompileEvent {
            id: ModuleId::new("/p/a.js").unwrap(),
            contents: "a".into(),
            source_map: None,
            imports: vec![],
            old_module: None,
        }
    }

    #[test]
    fn sync_hooks_edit_in_registration_order() {
        let hooks = Hooks::new();
        hooks.on_after_compile(|e| e.contents.push('1'));
        hooks.on_after_compile(|e| e.contents.push('2'));

        let mut e = event();
        hooks.emit_after_compile(&mut e);
        assert_eq!(e.contents, "a12");
    }

    #[test]
    fn removed_hooks_stop_firing() {
        let hooks = Hooks::new();
        let id = hooks.on_before_compile(|e| e.contents.clear());
        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));

        let mut e = event();
        hooks.emit_before_compile(&mut e);
        assert_eq!(e.contents, "a");
    }

    #[tokio::test]
    async fn did_compile_hooks_are_awaited_in_order() {
        let hooks = Hooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3u64 {
            let log = log.clone();
            hooks.on_did_compile(move |event| {
                let log = log.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(10 * (3 - n))).await;
                    log.lock().push(format!("{}:{}", n, event.id));
                }
                .boxed()
            });
        }

        hooks.emit_did_compile(Arc::new(event())).await;
        assert_eq!(*log.lock(), vec!["0:/p/a.js", "1:/p/a.js", "2:/p/a.js"]);
    }

    #[test]
    fn destroy_hooks_fire_until_cleared() {
        let hooks = Hooks::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        hooks.on_did_destroy(move || *c.lock() += 1);

        hooks.emit_did_destroy();
        hooks.clear();
        hooks.emit_did_destroy();
        assert_eq!(*count.lock(), 1);
    }
}
