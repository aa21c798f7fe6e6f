//! Watch mode.
//!
//! A [`WatchLoop`] feeds file changes into a single queue and recompiles
//! them one at a time, in arrival order, through [`ModuleGraph::read`].
//! Changes come from a `notify` watcher on the project root or from
//! [`WatchLoop::push_change`].
//!
//! ```text
//! Idle --start--> Watching --change--> Queued --dequeue--> Recompiling
//!                    ^                                         |
//!                    +------------- queue drained -------------+
//! any state --dispose--> Disposed
//! ```
//!
//! A failed recompile is reported through `on_after_compile` and `on_error`
//! and the loop keeps running.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bale_graph::ModuleGraph;
use futures::future::BoxFuture;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{Error, Result};

type ReadyCallback = Arc<dyn Fn() + Send + Sync>;
type PathCallback = Arc<dyn Fn(&Path) + Send + Sync>;
type AfterCompileCallback = Arc<dyn Fn(&Path, Option<&Error>) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;
type RebuildCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Created, not started.
    Idle,
    /// Waiting for changes.
    Watching,
    /// Changes are waiting in the queue.
    Queued,
    /// A change is being recompiled.
    Recompiling,
    Disposed,
}

/// Callbacks and filters for a [`WatchLoop`].
#[derive(Clone)]
pub struct WatchOptions {
    ignored: Vec<String>,
    debounce: Duration,
    use_fs_events: bool,
    on_ready: Option<ReadyCallback>,
    on_before_compile: Option<PathCallback>,
    on_after_compile: Option<AfterCompileCallback>,
    on_error: Option<ErrorCallback>,
    rebuild: Option<RebuildCallback>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignored: Vec::new(),
            debounce: Duration::from_millis(50),
            use_fs_events: true,
            on_ready: None,
            on_before_compile: None,
            on_after_compile: None,
            on_error: None,
            rebuild: None,
        }
    }
}

impl std::fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchOptions")
            .field("ignored", &self.ignored)
            .field("debounce", &self.debounce)
            .field("use_fs_events", &self.use_fs_events)
            .finish_non_exhaustive()
    }
}

impl WatchOptions {
    /// Ignore changes to paths matching `pattern`, a glob matched against
    /// the path relative to the root and the absolute path.
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignored.push(pattern.into());
        self
    }

    pub fn ignore_all<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Coalesce a filesystem event into an earlier one for the same path
    /// when that one arrived within `debounce` and has not been picked up
    /// yet. Once a recompile of the path begins, the next event queues again.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Disable the filesystem watcher; changes then only come from
    /// [`WatchLoop::push_change`].
    pub fn without_fs_events(mut self) -> Self {
        self.use_fs_events = false;
        self
    }

    pub fn on_ready(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Arc::new(callback));
        self
    }

    pub fn on_before_compile(mut self, callback: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_before_compile = Some(Arc::new(callback));
        self
    }

    pub fn on_after_compile(
        mut self,
        callback: impl Fn(&Path, Option<&Error>) + Send + Sync + 'static,
    ) -> Self {
        self.on_after_compile = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Runs after every successful recompile, before `on_after_compile`.
    /// Its error is reported like a compile error.
    pub fn rebuild<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.rebuild = Some(Arc::new(callback));
        self
    }

    pub(crate) fn has_rebuild_callback(&self) -> bool {
        self.rebuild.is_some()
    }
}

#[derive(Default)]
struct Queue {
    pending: usize,
    /// Filesystem events still waiting in the queue, by path.
    waiting: FxHashMap<PathBuf, Instant>,
}

/// Queue bookkeeping shared by the loop handle, the notify callback and the
/// dispatch task. State changes happen under the `queue` lock.
struct Shared {
    root: PathBuf,
    ignored: GlobSet,
    debounce: Duration,
    queue: Mutex<Queue>,
    state: watch::Sender<WatchState>,
}

impl Shared {
    fn is_ignored(&self, path: &Path) -> bool {
        if self.ignored.is_match(path) {
            return true;
        }
        path.strip_prefix(&self.root)
            .map(|relative| self.ignored.is_match(relative))
            .unwrap_or(false)
    }

    fn enqueue(&self, sender: &mpsc::UnboundedSender<PathBuf>, path: PathBuf) -> bool {
        let mut queue = self.queue.lock();
        self.push(&mut queue, sender, path)
    }

    /// Enqueue a filesystem event unless an event for the same path is
    /// still waiting and arrived less than `debounce` ago.
    fn offer(
        &self,
        sender: &mpsc::UnboundedSender<PathBuf>,
        path: PathBuf,
        now: Instant,
    ) -> bool {
        let mut queue = self.queue.lock();
        if let Some(queued_at) = queue.waiting.get(&path) {
            if now.saturating_duration_since(*queued_at) < self.debounce {
                tracing::trace!(path = %path.display(), "coalesced change");
                return false;
            }
        }
        if !self.push(&mut queue, sender, path.clone()) {
            return false;
        }
        queue.waiting.insert(path, now);
        true
    }

    fn push(
        &self,
        queue: &mut Queue,
        sender: &mpsc::UnboundedSender<PathBuf>,
        path: PathBuf,
    ) -> bool {
        let state = *self.state.borrow();
        if state == WatchState::Disposed || sender.send(path).is_err() {
            return false;
        }
        queue.pending += 1;
        if state == WatchState::Watching {
            self.state.send_replace(WatchState::Queued);
        }
        true
    }

    /// Take `path` off the waiting list. Returns `false` once disposed.
    fn begin(&self, path: &Path) -> bool {
        let mut queue = self.queue.lock();
        queue.waiting.remove(path);
        if *self.state.borrow() == WatchState::Disposed {
            return false;
        }
        self.state.send_replace(WatchState::Recompiling);
        true
    }

    fn settle(&self) {
        let mut queue = self.queue.lock();
        queue.pending = queue.pending.saturating_sub(1);
        if *self.state.borrow() == WatchState::Disposed {
            return;
        }
        let next = if queue.pending > 0 {
            WatchState::Queued
        } else {
            WatchState::Watching
        };
        self.state.send_replace(next);
    }

    fn set_running(&self) {
        let queue = self.queue.lock();
        let next = if queue.pending > 0 {
            WatchState::Queued
        } else {
            WatchState::Watching
        };
        self.state.send_replace(next);
    }

    fn dispose(&self) {
        let _queue = self.queue.lock();
        self.state.send_replace(WatchState::Disposed);
    }
}

/// Sequential recompile loop over one [`ModuleGraph`].
pub struct WatchLoop {
    graph: ModuleGraph,
    options: WatchOptions,
    shared: Arc<Shared>,
    sender: Option<mpsc::UnboundedSender<PathBuf>>,
    receiver: Option<mpsc::UnboundedReceiver<PathBuf>>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("root", &self.shared.root)
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WatchLoop {
    /// A loop in the `Idle` state. Fails on an invalid ignore glob.
    pub fn new(graph: ModuleGraph, options: WatchOptions) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.ignored {
            let glob = Glob::new(pattern).map_err(|err| {
                Error::InvalidConfig(format!("invalid watch ignore pattern '{}': {}", pattern, err))
            })?;
            builder.add(glob);
        }
        let ignored = builder
            .build()
            .map_err(|err| Error::InvalidConfig(format!("invalid watch ignore patterns: {}", err)))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(WatchState::Idle);
        let shared = Arc::new(Shared {
            root: graph.root().to_path_buf(),
            ignored,
            debounce: options.debounce,
            queue: Mutex::new(Queue::default()),
            state,
        });

        Ok(Self {
            graph,
            options,
            shared,
            sender: Some(sender),
            receiver: Some(receiver),
            watcher: None,
            task: None,
        })
    }

    /// Start the dispatch task and, unless disabled, the filesystem watcher.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        let Some(receiver) = self.receiver.take() else {
            return Err(Error::Watch("watch loop already started".to_string()));
        };
        let Some(sender) = self.sender.clone() else {
            return Err(Error::Watch("watch loop is disposed".to_string()));
        };

        if self.options.use_fs_events {
            self.watcher = Some(self.spawn_watcher(sender)?);
        }

        self.shared.set_running();
        self.task = Some(tokio::spawn(dispatch(
            self.graph.clone(),
            self.options.clone(),
            self.shared.clone(),
            receiver,
        )));

        tracing::info!(root = %self.shared.root.display(), "watching for changes");
        if let Some(on_ready) = &self.options.on_ready {
            on_ready();
        }
        Ok(())
    }

    fn spawn_watcher(&self, sender: mpsc::UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
        let shared = self.shared.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "filesystem watcher error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if shared.is_ignored(&path) {
                    continue;
                }
                shared.offer(&sender, path, Instant::now());
            }
        })?;

        watcher.watch(&self.shared.root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    /// Queue a change to `path`. Returns `false` if it was ignored or the
    /// loop is disposed.
    pub fn push_change(&self, path: impl Into<PathBuf>) -> bool {
        let path: PathBuf = path.into();
        let path = if path.is_absolute() {
            path
        } else {
            self.shared.root.join(path)
        };
        if self.shared.is_ignored(&path) {
            tracing::debug!(path = %path.display(), "ignored change");
            return false;
        }
        match &self.sender {
            Some(sender) => self.shared.enqueue(sender, path),
            None => false,
        }
    }

    pub fn state(&self) -> WatchState {
        *self.shared.state.borrow()
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.shared.state.subscribe()
    }

    /// Wait until the queue is drained (`Watching`) or the loop is disposed.
    /// On a loop that was never started this waits for `start`.
    pub async fn settled(&self) -> WatchState {
        let mut receiver = self.shared.state.subscribe();
        match receiver
            .wait_for(|state| matches!(state, WatchState::Watching | WatchState::Disposed))
            .await
        {
            Ok(state) => *state,
            Err(_) => WatchState::Disposed,
        }
    }

    /// Stop the watcher and the dispatch task. A recompile that is already
    /// running finishes first; queued changes are dropped.
    pub async fn dispose(&mut self) {
        self.shared.dispose();
        self.watcher = None;
        self.sender = None;
        self.receiver = None;
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "watch dispatch task failed");
            }
        }
        tracing::debug!(root = %self.shared.root.display(), "watch loop disposed");
    }
}

impl Drop for WatchLoop {
    fn drop(&mut self) {
        self.shared.dispose();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn dispatch(
    graph: ModuleGraph,
    options: WatchOptions,
    shared: Arc<Shared>,
    mut receiver: mpsc::UnboundedReceiver<PathBuf>,
) {
    let mut state = shared.state.subscribe();
    loop {
        let next = tokio::select! {
            biased;
            _ = async {
                let _ = state.wait_for(|state| *state == WatchState::Disposed).await;
            } => None,
            next = receiver.recv() => next,
        };
        let Some(path) = next else {
            break;
        };
        if !shared.begin(&path) {
            break;
        }
        if !graph.contains_path(&path) {
            tracing::debug!(path = %path.display(), "change to a file outside the graph");
            shared.settle();
            continue;
        }

        if let Some(callback) = &options.on_before_compile {
            callback(&path);
        }

        let mut result = graph.read(&path).await.map_err(Error::from);
        if let (Ok(()), Some(rebuild)) = (&result, &options.rebuild) {
            result = rebuild().await;
        }

        match &result {
            Ok(()) => tracing::debug!(path = %path.display(), "recompiled"),
            Err(err) => match &options.on_error {
                Some(on_error) => on_error(err),
                None => tracing::warn!(path = %path.display(), error = %err, "recompile failed"),
            },
        }
        if let Some(callback) = &options.on_after_compile {
            callback(&path, result.as_ref().err());
        }

        shared.settle();
    }
}
