//! The [`Bundler`] facade: configuration in, bundles out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bale_config::{BaleConfig, SourceMapPath, validate_schema};
use bale_graph::{
    CommandInstaller, FileStore, FsResolver, InstallOptions, InstallResolver, ModuleGraph,
    NativeFileStore, Resolver, TransformPipeline,
};
use futures::future::{FutureExt, try_join_all};
use path_clean::PathClean;

use crate::chunk::Chunk;
use crate::chunking::{ChunkBuilder, ChunkTransformer, compute_mappings};
use crate::generator::{
    Bundle, DefaultGenerator, GenerateContext, Generator, GeneratorConfig, PublicPaths,
};
use crate::output::write_bundles_to;
use crate::plugins::PluginRegistry;
use crate::watch::{WatchLoop, WatchOptions};
use crate::{Error, Result};

/// Everything one build produced, one bundle per chunk.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub bundles: Vec<Bundle>,
}

impl BuildOutput {
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// The bundle whose chunk carries the entries, i.e. the one to load first.
    pub fn entry_bundle(&self) -> Option<&Bundle> {
        self.bundles.first()
    }
}

struct BundlerInner {
    config: BaleConfig,
    graph: ModuleGraph,
    generator: Arc<dyn Generator>,
    chunk_transformers: Vec<Arc<dyn ChunkTransformer>>,
    generator_config: GeneratorConfig,
    public_paths: PublicPaths,
}

/// A configured bundling session. Cheap to clone; clones share the graph.
#[derive(Clone)]
pub struct Bundler {
    inner: Arc<BundlerInner>,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("graph", &self.inner.graph)
            .field("generator", &self.inner.generator.name())
            .field(
                "chunk_transformers",
                &self
                    .inner
                    .chunk_transformers
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Bundler {
    /// Build a bundler reading from the real filesystem.
    pub fn from_config(config: BaleConfig, registry: &PluginRegistry) -> Result<Self> {
        Self::with_store(config, registry, Arc::new(NativeFileStore::new()))
    }

    /// Build a bundler on top of `store`.
    ///
    /// Resolvers run in this order: plugins listed in the configuration,
    /// the filesystem resolver, then the install resolver when
    /// `resolve.install.enabled` is set.
    pub fn with_store(
        config: BaleConfig,
        registry: &PluginRegistry,
        store: Arc<dyn FileStore>,
    ) -> Result<Self> {
        validate_schema(&config)?;

        let root = if config.root_directory.is_absolute() {
            config.root_directory.clean()
        } else {
            std::env::current_dir()?.join(&config.root_directory).clean()
        };
        let config = BaleConfig {
            root_directory: root.clone(),
            ..config
        };

        let plugins = registry.resolve(&config)?;
        let generator = registry.generator(DefaultGenerator::NAME, &config)?;

        let mut pipeline = TransformPipeline::new();
        for transformer in plugins.transformers {
            pipeline.push(transformer);
        }

        let mut resolvers = plugins.resolvers;
        resolvers.push(Arc::new(FsResolver::new(config.resolve.extensions.clone())));
        if config.resolve.install.enabled {
            resolvers.push(install_resolver(&config)?);
        }

        let graph = ModuleGraph::builder(store, root)
            .entries(config.entries.iter().cloned())
            .pipeline(pipeline)
            .resolvers(resolvers)
            .build()
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;

        let generator_config = GeneratorConfig::from(&config.generator);
        let public_paths = PublicPaths::new(generator_config.path_type);

        tracing::debug!(
            root = %config.root_directory.display(),
            entries = config.entries.len(),
            generator = generator.name(),
            "bundler configured"
        );

        Ok(Self {
            inner: Arc::new(BundlerInner {
                config,
                graph,
                generator,
                chunk_transformers: plugins.chunk_transformers,
                generator_config,
                public_paths,
            }),
        })
    }

    pub fn config(&self) -> &BaleConfig {
        &self.inner.config
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.inner.graph
    }

    pub fn generator_config(&self) -> &GeneratorConfig {
        &self.inner.generator_config
    }

    pub async fn compile(&self) -> Result<()> {
        self.inner.graph.compile().await?;
        Ok(())
    }

    /// Partition the compiled graph and run the chunk transformers.
    pub fn chunks(&self) -> Result<Vec<Chunk>> {
        let builder = ChunkBuilder::new();
        let mut chunks = builder.partition(&self.inner.graph, self.inner.config.chunking.strategy)?;
        builder.transform(&mut chunks, &self.inner.chunk_transformers)?;
        compute_mappings(&mut chunks);
        Ok(chunks)
    }

    /// Generate every chunk of the compiled graph.
    pub async fn generate(&self) -> Result<Vec<Bundle>> {
        let chunks = self.chunks()?;
        self.generate_chunks(&chunks, &self.inner.generator_config)
            .await
    }

    async fn generate_chunks(
        &self,
        chunks: &[Chunk],
        config: &GeneratorConfig,
    ) -> Result<Vec<Bundle>> {
        let context = GenerateContext {
            paths: self.inner.graph.paths(),
            store: self.inner.graph.store().as_ref(),
            config,
            public_paths: &self.inner.public_paths,
        };
        let generator = &self.inner.generator;
        try_join_all(
            chunks
                .iter()
                .map(|chunk| async move { generator.generate(chunk, &context).await }),
        )
        .await
    }

    /// Compile and generate.
    pub async fn build(&self) -> Result<BuildOutput> {
        let started = Instant::now();
        self.compile().await?;
        let bundles = self.generate().await?;
        tracing::info!(
            modules = self.inner.graph.len(),
            chunks = bundles.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );
        Ok(BuildOutput { bundles })
    }

    /// Every compiled module in one chunk, ignoring the chunking options.
    pub async fn generate_bundle(&self) -> Result<Bundle> {
        let chunk = self.single_chunk()?;
        self.generate_single(&chunk, &self.inner.generator_config)
            .await
    }

    /// Source map of [`Bundler::generate_bundle`] with source maps forced on.
    ///
    /// Returns the JSON map, or a `//# sourceMappingURL=` data-url comment
    /// when `as_comment` is set.
    pub async fn generate_source_map(&self, as_comment: bool) -> Result<String> {
        let chunk = self.single_chunk()?;
        let config = GeneratorConfig {
            source_map: true,
            source_map_path: SourceMapPath::External,
            ..self.inner.generator_config.clone()
        };
        let bundle = self.generate_single(&chunk, &config).await?;
        let map = bundle
            .source_map
            .ok_or_else(|| Error::Generate("generator did not produce a source map".to_string()))?;
        Ok(if as_comment {
            format!("//# sourceMappingURL={}", map.to_data_url())
        } else {
            map.to_json_string()
        })
    }

    fn single_chunk(&self) -> Result<Chunk> {
        let builder = ChunkBuilder::new();
        let mut chunks =
            builder.partition(&self.inner.graph, bale_config::ChunkStrategy::Single)?;
        chunks
            .pop()
            .ok_or_else(|| Error::Generate("graph produced no chunk".to_string()))
    }

    async fn generate_single(&self, chunk: &Chunk, config: &GeneratorConfig) -> Result<Bundle> {
        let mut bundles = self.generate_chunks(std::slice::from_ref(chunk), config).await?;
        bundles
            .pop()
            .ok_or_else(|| Error::Generate("generator returned no bundle".to_string()))
    }

    /// Write `output` into the configured output directory. External source
    /// maps are written next to their bundle.
    pub fn write(&self, output: &BuildOutput, overwrite: bool) -> Result<Vec<PathBuf>> {
        let config = &self.inner.generator_config;
        let write_maps = config.source_map && config.source_map_path == SourceMapPath::External;
        write_bundles_to(
            &output.bundles,
            &self.inner.config.output_path(),
            overwrite,
            write_maps,
        )
    }

    /// Start a [`WatchLoop`] over this bundler's graph.
    ///
    /// The configured ignore globs and debounce are added to `options`.
    /// With `watch.generate` and no rebuild callback of its own, every
    /// successful recompile regenerates the output and writes it.
    pub fn watch(&self, options: WatchOptions) -> Result<WatchLoop> {
        let watch = &self.inner.config.watch;
        let mut options = options
            .ignore_all(watch.ignored.iter().cloned())
            .debounce(Duration::from_millis(watch.debounce_ms));

        if watch.generate && !options.has_rebuild_callback() {
            let bundler = self.clone();
            options = options.rebuild(move || {
                let bundler = bundler.clone();
                async move {
                    let bundles = bundler.generate().await?;
                    bundler.write(&BuildOutput { bundles }, true)?;
                    Ok(())
                }
                .boxed()
            });
        }

        let mut watch_loop = WatchLoop::new(self.inner.graph.clone(), options)?;
        watch_loop.start()?;
        Ok(watch_loop)
    }

    /// Dispose the graph: fires `did_destroy` hooks and clears the registry.
    pub fn dispose(&self) {
        self.inner.graph.dispose();
    }
}

fn install_resolver(config: &BaleConfig) -> Result<Arc<dyn Resolver>> {
    let install = &config.resolve.install;
    let options = InstallOptions {
        save: install.save,
        silent: install.silent,
        include: install.include.clone(),
        exclude: install.exclude.clone(),
        ..Default::default()
    };
    let resolver = InstallResolver::new(Arc::new(CommandInstaller::new(&install.command)), options)
        .map_err(|err| Error::InvalidConfig(format!("invalid install filter: {}", err)))?;
    Ok(Arc::new(resolver))
}
