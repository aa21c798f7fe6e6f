use std::path::PathBuf;

use thiserror::Error;

use crate::module_id::{ModuleId, ModuleIdError};
use crate::store::StoreError;

/// Errors produced while resolving an import request.
///
/// Resolution errors are cloned to every caller waiting on the same
/// resolution lock, so every variant carries owned, cloneable data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No resolver produced a module id.
    #[error("Cannot find module '{request}'{}", .from.as_ref().map(|f| format!(" from '{}'", f)).unwrap_or_default())]
    NotFound {
        request: String,
        from: Option<ModuleId>,
    },

    /// Installing a missing package failed.
    #[error("Failed to install '{package}': {reason}")]
    Install { package: String, reason: String },

    /// The file store failed while probing candidates.
    #[error("Store error during resolution: {0}")]
    Store(String),

    /// A resolver plugin failed.
    #[error("Resolver '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        ResolveError::Store(err.to_string())
    }
}

impl From<ModuleIdError> for ResolveError {
    fn from(err: ModuleIdError) -> Self {
        ResolveError::Store(err.to_string())
    }
}

/// Errors produced by the module graph.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Reading a module's source failed.
    #[error("Failed to read '{}': {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    /// An import could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A transformer failed.
    #[error("Transformer '{plugin}' failed on '{}': {message}", .path.display())]
    Transform {
        path: PathBuf,
        plugin: String,
        message: String,
    },

    /// A module reachable from an entry is missing from the registry.
    #[error("Module not found in registry: {0}")]
    ModuleNotFound(ModuleId),

    /// A transformer returned a source map that does not parse.
    #[error("Invalid source map for '{}': {reason}", .path.display())]
    InvalidSourceMap { path: PathBuf, reason: String },

    /// A path could not be turned into a module id.
    #[error("Invalid module path: {0}")]
    InvalidPath(#[from] ModuleIdError),
}

impl CompileError {
    pub(crate) fn read(path: impl Into<PathBuf>, err: &StoreError) -> Self {
        CompileError::Read {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_mentions_importer() {
        let err = ResolveError::NotFound {
            request: "left-pad".into(),
            from: Some(ModuleId::new("/project/index.js").unwrap()),
        };
        assert_eq!(
            err.to_string(),
            "Cannot find module 'left-pad' from '/project/index.js'"
        );

        let entry = ResolveError::NotFound {
            request: "./main".into(),
            from: None,
        };
        assert_eq!(entry.to_string(), "Cannot find module './main'");
    }

    #[test]
    fn resolve_errors_convert_transparently() {
        let err: CompileError = ResolveError::Install {
            package: "react".into(),
            reason: "exit status 1".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Failed to install 'react': exit status 1");
    }
}
