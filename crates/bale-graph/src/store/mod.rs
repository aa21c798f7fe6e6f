//! File store abstraction for the bale bundler
//!
//! This module defines the `FileStore` trait that abstracts the filesystem
//! operations the compiler needs: reading sources, stat-ing candidates during
//! resolution and creating output directories. The module graph never touches
//! `std::fs` directly, so a graph can be driven from disk ([`NativeFileStore`])
//! or entirely from memory ([`MemoryFileStore`]).

pub mod memory;
pub mod native;

pub use memory::MemoryFileStore;
pub use native::NativeFileStore;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for file store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during file store operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other store error
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Returns `true` if the error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::FileNotFound(_))
    }
}

/// File metadata
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Whether this is a file
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

/// Filesystem collaborator used by the compiler.
///
/// Implementations must be cheap to share behind an `Arc`; the module graph,
/// the resolvers and the output writer all hold the same store.
#[async_trait]
pub trait FileStore: Send + Sync + std::fmt::Debug {
    /// Read a file as UTF-8 text
    async fn read_file(&self, path: &Path) -> StoreResult<String>;

    /// Write a file
    async fn write_file(&self, path: &Path, content: &[u8]) -> StoreResult<()>;

    /// Get file metadata
    async fn stat(&self, path: &Path) -> StoreResult<FileMetadata>;

    /// Create a single directory level
    async fn mkdir(&self, path: &Path) -> StoreResult<()>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// Create `path` unless it already exists.
///
/// Mirrors the `stat` then `mkdir` on ENOENT dance: any error other than
/// "not found" from `stat` is returned as-is, and a directory that appears
/// between the two calls is not treated as a failure.
pub async fn ensure_dir(store: &dyn FileStore, path: &Path) -> StoreResult<()> {
    // Walk up until an existing ancestor is found, then create downwards.
    let mut missing = Vec::new();
    let mut current = Some(path);
    while let Some(dir) = current.filter(|p| !p.as_os_str().is_empty()) {
        match store.stat(dir).await {
            Ok(metadata) if metadata.is_dir => break,
            Ok(_) => {
                return Err(StoreError::Io(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            Err(err) if err.is_not_found() => missing.push(dir.to_path_buf()),
            Err(err) => return Err(err),
        }
        current = dir.parent();
    }

    for dir in missing.iter().rev() {
        match store.mkdir(dir).await {
            Ok(()) => {}
            Err(_) if store.exists(dir) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
