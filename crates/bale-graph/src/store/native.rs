//! Native file store backed by the OS filesystem.

// NativeFileStore is the one place that wraps std::fs
#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::task;

use super::{FileMetadata, FileStore, StoreError, StoreResult};

/// Native filesystem store using `std::fs`.
///
/// Blocking calls run on tokio's blocking pool so a compilation that fans
/// out over many imports never stalls the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileStore;

impl NativeFileStore {
    /// Create a new NativeFileStore instance.
    pub fn new() -> Self {
        Self
    }
}

fn map_io(path: &Path, action: &str, err: std::io::Error) -> StoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StoreError::FileNotFound(path.to_path_buf())
    } else {
        StoreError::Io(format!("Failed to {} {}: {}", action, path.display(), err))
    }
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Other(format!("Task join error: {}", e)))?
}

#[async_trait]
impl FileStore for NativeFileStore {
    async fn read_file(&self, path: &Path) -> StoreResult<String> {
        let path: PathBuf = path.to_path_buf();
        blocking(move || std::fs::read_to_string(&path).map_err(|e| map_io(&path, "read", e))).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();
        blocking(move || std::fs::write(&path, content).map_err(|e| map_io(&path, "write", e)))
            .await
    }

    async fn stat(&self, path: &Path) -> StoreResult<FileMetadata> {
        let path = path.to_path_buf();
        blocking(move || {
            let metadata = std::fs::metadata(&path).map_err(|e| map_io(&path, "stat", e))?;

            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);

            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                modified,
            })
        })
        .await
    }

    async fn mkdir(&self, path: &Path) -> StoreResult<()> {
        let path = path.to_path_buf();
        blocking(move || std::fs::create_dir(&path).map_err(|e| map_io(&path, "create", e))).await
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
