//! Chunk serialization.
//!
//! A [`Generator`] turns one [`Chunk`] into bundle text plus a merged source
//! map. The [`DefaultGenerator`] emits this layout, one part per line group,
//! joined with `\n`:
//!
//! ```text
//! ;(function() {
//! <runtime wrapper>
//! __bale.registerModule("<public path>", function(__filename, __dirname, require, module, exports) {
//! <compiled contents>
//! });
//! ...one block per member file...
//! __bale.registerMappings("<chunk id>", {"<public path>": "$<namespace>/<relative path>", ...}, {"<public path>": {"<request>": "<public path>", ...}, ...})
//! __bale.ensure(["<chunk id>", ...], '$root', function() {   (only with cross-chunk entries)
//! __bale.require("<entry public path>")
//! })                                                          (only with cross-chunk entries)
//! })();
//! ```
//!
//! Line accounting: the first module's contents start on the line after the
//! prologue's last line plus its `registerModule` line, and every block adds
//! `newlines(contents) + 3` lines.
//!
//! The third `registerMappings` argument carries every module's import
//! requests as they were resolved at build time, so the runtime never has to
//! re-resolve `require` calls itself.

mod public_path;
mod sourcemap;

pub use public_path::PublicPaths;
pub use sourcemap::line_count;

use std::path::PathBuf;

use async_trait::async_trait;
use bale_config::{GeneratorOptions, PathType, SourceMapPath};
use bale_graph::{FileStore, ModuleId, PathMapper, ROOT_TOKEN, SourceMap};
use serde_json::Value;

use crate::chunk::Chunk;
use crate::{Error, Result};
use sourcemap::SourceMapMerger;

/// Global the runtime wrapper installs itself as.
pub const RUNTIME_GLOBAL: &str = "__bale";

const PROLOGUE: &str = ";(function() {";
const EPILOGUE: &str = "})();\n";
const NORMAL_WRAPPER: &str = include_str!("wrappers/normal.js");

/// Runtime loader placed after the prologue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Wrapper {
    /// The built-in runtime.
    #[default]
    Normal,
    /// A runtime read from this file, relative to the project root.
    Custom(PathBuf),
}

impl Wrapper {
    pub fn from_name(name: &str) -> Self {
        match name {
            "normal" => Wrapper::Normal,
            path => Wrapper::Custom(PathBuf::from(path)),
        }
    }
}

/// Resolved generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub wrapper: Wrapper,
    pub source_map: bool,
    pub source_map_path: SourceMapPath,
    pub path_type: PathType,
    pub source_namespace: String,
    pub source_map_namespace: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&GeneratorOptions::default())
    }
}

impl From<&GeneratorOptions> for GeneratorConfig {
    fn from(options: &GeneratorOptions) -> Self {
        Self {
            wrapper: Wrapper::from_name(&options.wrapper),
            source_map: options.source_map,
            source_map_path: options.source_map_path,
            path_type: options.path_type,
            source_namespace: options.source_namespace.clone(),
            source_map_namespace: options.source_map_namespace.clone(),
        }
    }
}

/// Everything a generator may consult besides the chunk.
#[derive(Clone, Copy)]
pub struct GenerateContext<'a> {
    pub paths: &'a PathMapper,
    pub store: &'a dyn FileStore,
    pub config: &'a GeneratorConfig,
    pub public_paths: &'a PublicPaths,
}

/// Output of one generator run.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub chunk_id: crate::ChunkId,
    pub output_name: String,
    pub contents: String,
    /// Present when source maps are enabled, in both inline and external mode.
    pub source_map: Option<SourceMap>,
    /// Module ids serialized into `contents`, in order.
    pub files: Vec<ModuleId>,
}

impl Bundle {
    /// File name of the external source map, `<output>.map`.
    pub fn source_map_name(&self) -> String {
        format!("{}.map", self.output_name)
    }

    pub fn source_map_json(&self) -> Option<String> {
        self.source_map.as_ref().map(|map| map.to_json_string())
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, chunk: &Chunk, context: &GenerateContext<'_>) -> Result<Bundle>;
}

/// The built-in generator targeting the `normal` runtime protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGenerator;

impl DefaultGenerator {
    pub const NAME: &'static str = "default";

    async fn wrapper_contents(context: &GenerateContext<'_>) -> Result<String> {
        match &context.config.wrapper {
            Wrapper::Normal => Ok(NORMAL_WRAPPER.trim_end().to_string()),
            Wrapper::Custom(path) => {
                let path = context.paths.root().join(path);
                let contents = context.store.read_file(&path).await.map_err(|err| {
                    Error::Generate(format!("cannot read wrapper {}: {}", path.display(), err))
                })?;
                Ok(contents.trim_end().to_string())
            }
        }
    }
}

#[async_trait]
impl Generator for DefaultGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn generate(&self, chunk: &Chunk, context: &GenerateContext<'_>) -> Result<Bundle> {
        let config = context.config;
        let output_name = chunk.output_name();
        let wrapper = Self::wrapper_contents(context).await?;

        let mut parts = vec![PROLOGUE.to_string(), wrapper];
        // contents start one line below the registerModule line
        let mut line_offset = line_count(&parts.join("\n")) + 1;
        let mut merger = config.source_map.then(|| SourceMapMerger::new(&output_name));
        let mut mappings = serde_json::Map::new();
        let mut requests = serde_json::Map::new();

        for module in chunk.modules() {
            let public_path = context.public_paths.get(context.paths, &module.id);
            let relative = context.paths.relative(&module.id);
            let block = format!(
                "{RUNTIME_GLOBAL}.registerModule({}, function(__filename, __dirname, require, module, exports) {{\n{}\n}});",
                quote(&public_path),
                module.contents
            );

            if let Some(merger) = merger.as_mut() {
                let source_name = format!("bale:///${}/{}", config.source_map_namespace, relative);
                merger.add_module(
                    &source_name,
                    &module.sources,
                    module.source_map.as_deref(),
                    &module.contents,
                    line_offset,
                );
            }
            line_offset += line_count(&block);
            parts.push(block);

            if !module.requests.is_empty() {
                let targets = module
                    .requests
                    .iter()
                    .map(|(request, target)| {
                        let target = context.public_paths.get(context.paths, target);
                        (request.clone(), Value::String(target))
                    })
                    .collect();
                requests.insert(public_path.clone(), Value::Object(targets));
            }
            mappings.insert(
                public_path,
                Value::String(format!("${}/{}", config.source_namespace, relative)),
            );
        }

        parts.push(format!(
            "{RUNTIME_GLOBAL}.registerMappings({}, {}, {})",
            quote(&chunk.id.to_string()),
            Value::Object(mappings),
            Value::Object(requests)
        ));

        let mut external: Vec<String> = Vec::new();
        for entry in &chunk.entries {
            let Some(resolved) = &entry.resolved else {
                continue;
            };
            let owner = chunk.mappings.iter().find(|m| &m.module == resolved);
            if let Some(mapping) = owner {
                let id = mapping.chunk.to_string();
                if !external.contains(&id) {
                    external.push(id);
                }
            }
        }
        let ensure = !external.is_empty();
        if ensure {
            let ids = Value::Array(external.into_iter().map(Value::String).collect());
            parts.push(format!("{RUNTIME_GLOBAL}.ensure({ids}, '{ROOT_TOKEN}', function() {{"));
        }

        for entry in &chunk.entries {
            let Some(resolved) = &entry.resolved else {
                return Err(Error::Consistency {
                    request: entry.request.clone(),
                });
            };
            let public_path = context.public_paths.get(context.paths, resolved);
            parts.push(format!("{RUNTIME_GLOBAL}.require({})", quote(&public_path)));
        }

        if ensure {
            parts.push("})".to_string());
        }
        parts.push(EPILOGUE.to_string());

        let source_map = merger.map(SourceMapMerger::finish);
        if let Some(map) = &source_map {
            if config.source_map_path == SourceMapPath::Inline {
                parts.push(format!("//# sourceMappingURL={}", map.to_data_url()));
            }
        }

        let files: Vec<ModuleId> = chunk.files.keys().cloned().collect();
        tracing::debug!(
            chunk = %chunk.id,
            files = files.len(),
            entries = chunk.entries.len(),
            "generated chunk"
        );

        Ok(Bundle {
            chunk_id: chunk.id,
            output_name,
            contents: parts.join("\n"),
            source_map,
            files,
        })
    }
}

/// JSON string literal for `value`.
fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
