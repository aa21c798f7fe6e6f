//! Transformer plugins and the pipeline that runs them.
//!
//! A transformer sees a file's current contents and may return new contents,
//! a source map and the import requests it discovered. Transformers run in
//! registration order; each one sees the output of the previous one.

pub mod scan;

pub use scan::ImportScanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use oxc_sourcemap::SourceMap;
use thiserror::Error;

use crate::error::CompileError;

/// File handed to a transformer.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub path: &'a Path,
    pub contents: &'a str,
    /// Public path of the file, e.g. `$root/src/index.js`.
    pub public_path: &'a str,
}

/// Output of a single transformer.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub contents: String,
    /// Source map as JSON. Replaces any map produced earlier in the pipeline.
    pub source_map: Option<String>,
    /// Unresolved import requests, e.g. `./util` or `lodash/map`.
    pub imports: Vec<String>,
}

/// Failure reported by a transformer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type TransformResult = Result<Option<TransformOutput>, TransformError>;

/// A source transform plugin.
///
/// Returning `Ok(None)` means "not applicable"; the file passes through.
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(&self, file: SourceFile<'_>) -> TransformResult;
}

/// Combined result of running every transformer.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub contents: String,
    pub source_map: Option<SourceMap>,
    pub imports: Vec<String>,
}

/// Ordered list of transformers.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transformers: Vec<Arc<dyn Transformer>>,
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transformers.iter().map(|t| t.name()))
            .finish()
    }
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Arc::new(transformer));
        self
    }

    pub fn push(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Run every transformer over `contents`.
    pub async fn run(
        &self,
        path: &Path,
        contents: &str,
        public_path: &str,
    ) -> Result<Transformed, CompileError> {
        let mut current = contents.to_string();
        let mut source_map: Option<String> = None;
        let mut imports: Vec<String> = Vec::new();

        for transformer in &self.transformers {
            let file = SourceFile {
                path,
                contents: &current,
                public_path,
            };
            let output = transformer
                .transform(file)
                .await
                .map_err(|err| CompileError::Transform {
                    path: path.to_path_buf(),
                    plugin: transformer.name().to_string(),
                    message: err.message,
                })?;

            let Some(output) = output else {
                continue;
            };

            tracing::trace!(
                plugin = transformer.name(),
                path = %path.display(),
                imports = output.imports.len(),
                "transformed"
            );

            current = output.contents;
            if output.source_map.is_some() {
                source_map = output.source_map;
            }
            for import in output.imports {
                if !imports.contains(&import) {
                    imports.push(import);
                }
            }
        }

        let source_map = source_map
            .map(|json| parse_source_map(path, &json))
            .transpose()?;

        Ok(Transformed {
            contents: current,
            source_map,
            imports,
        })
    }
}

fn parse_source_map(path: &Path, json: &str) -> Result<SourceMap, CompileError> {
    SourceMap::from_json_string(json).map_err(|err| CompileError::InvalidSourceMap {
        path: PathBuf::from(path),
        reason: err.to_string(),
    })
}
