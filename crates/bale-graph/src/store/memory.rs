//! In-memory file store
//!
//! `MemoryFileStore` keeps files in a hash map keyed by normalized absolute
//! path. Relative paths are resolved against the store root. Directories are
//! tracked explicitly (`mkdir`) and implicitly (any ancestor of a stored file).

use async_trait::async_trait;
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileMetadata, FileStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    files: FxHashMap<PathBuf, String>,
    dirs: FxHashSet<PathBuf>,
    reads: FxHashMap<PathBuf, usize>,
}

/// File store that never touches the disk.
///
/// Cloning is cheap and clones share the same backing map, so a test can keep
/// a handle for editing files while the graph holds another.
#[derive(Debug, Clone)]
pub struct MemoryFileStore {
    state: Arc<RwLock<MemoryState>>,
    root: PathBuf,
}

impl MemoryFileStore {
    /// Create an empty store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.clean();
        let mut state = MemoryState::default();
        state.dirs.insert(root.clone());
        Self {
            state: Arc::new(RwLock::new(state)),
            root,
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert or replace a file.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let normalized = self.normalize(path.as_ref());
        self.state.write().files.insert(normalized, contents.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Remove a file, returning its previous contents.
    pub fn remove(&self, path: impl AsRef<Path>) -> Option<String> {
        let normalized = self.normalize(path.as_ref());
        self.state.write().files.remove(&normalized)
    }

    /// Current contents of a file, without counting as a read.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let normalized = self.normalize(path.as_ref());
        self.state.read().files.get(&normalized).cloned()
    }

    /// Number of successful `read_file` calls for `path`.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let normalized = self.normalize(path.as_ref());
        self.state.read().reads.get(&normalized).copied().unwrap_or(0)
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.state.read().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        }
    }

    fn is_dir(state: &MemoryState, path: &Path) -> bool {
        state.dirs.contains(path) || state.files.keys().any(|file| file.starts_with(path) && file != path)
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn read_file(&self, path: &Path) -> StoreResult<String> {
        let normalized = self.normalize(path);
        let mut state = self.state.write();
        let contents = state
            .files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| StoreError::FileNotFound(normalized.clone()))?;
        *state.reads.entry(normalized).or_default() += 1;
        Ok(contents)
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        let normalized = self.normalize(path);
        let text = String::from_utf8(content.to_vec())
            .map_err(|e| StoreError::Io(format!("{} is not UTF-8: {}", normalized.display(), e)))?;
        let mut state = self.state.write();
        if let Some(parent) = normalized.parent() {
            if !Self::is_dir(&state, parent) {
                return Err(StoreError::FileNotFound(parent.to_path_buf()));
            }
        }
        state.files.insert(normalized, text);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> StoreResult<FileMetadata> {
        let normalized = self.normalize(path);
        let state = self.state.read();
        if let Some(contents) = state.files.get(&normalized) {
            return Ok(FileMetadata {
                size: contents.len() as u64,
                is_dir: false,
                is_file: true,
                modified: None,
            });
        }
        if Self::is_dir(&state, &normalized) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(StoreError::FileNotFound(normalized))
    }

    async fn mkdir(&self, path: &Path) -> StoreResult<()> {
        let normalized = self.normalize(path);
        let mut state = self.state.write();
        if state.files.contains_key(&normalized) || Self::is_dir(&state, &normalized) {
            return Err(StoreError::Io(format!(
                "{} already exists",
                normalized.display()
            )));
        }
        state.dirs.insert(normalized);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let normalized = self.normalize(path);
        let state = self.state.read();
        state.files.contains_key(&normalized) || Self::is_dir(&state, &normalized)
    }
}
