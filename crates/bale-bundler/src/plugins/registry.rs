//! Plugin registry keyed by name and capability.
//!
//! Configuration refers to plugins by name (`plugins = ["scan", "commons"]`).
//! The registry maps each name to a factory for one capability and is
//! consulted once, when a [`Bundler`](crate::Bundler) is built.

use std::sync::Arc;

use bale_config::BaleConfig;
use bale_graph::{ImportScanner, Resolver, Transformer};
use indexmap::IndexMap;

use crate::chunking::{ChunkTransformer, CommonsChunk};
use crate::generator::{DefaultGenerator, Generator};
use crate::{Error, Result};

pub type TransformerFactory = Arc<dyn Fn(&BaleConfig) -> Arc<dyn Transformer> + Send + Sync>;
pub type ResolverFactory = Arc<dyn Fn(&BaleConfig) -> Arc<dyn Resolver> + Send + Sync>;
pub type ChunkTransformerFactory =
    Arc<dyn Fn(&BaleConfig) -> Arc<dyn ChunkTransformer> + Send + Sync>;
pub type GeneratorFactory = Arc<dyn Fn(&BaleConfig) -> Arc<dyn Generator> + Send + Sync>;

/// What a registered name provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginKind {
    Transformer,
    Resolver,
    ChunkTransformer,
    Generator,
}

#[derive(Clone)]
enum Factory {
    Transformer(TransformerFactory),
    Resolver(ResolverFactory),
    ChunkTransformer(ChunkTransformerFactory),
    Generator(GeneratorFactory),
}

impl Factory {
    fn kind(&self) -> PluginKind {
        match self {
            Factory::Transformer(_) => PluginKind::Transformer,
            Factory::Resolver(_) => PluginKind::Resolver,
            Factory::ChunkTransformer(_) => PluginKind::ChunkTransformer,
            Factory::Generator(_) => PluginKind::Generator,
        }
    }
}

/// Plugins instantiated for one configuration, in configuration order.
#[derive(Default)]
pub struct ResolvedPlugins {
    pub transformers: Vec<Arc<dyn Transformer>>,
    pub resolvers: Vec<Arc<dyn Resolver>>,
    pub chunk_transformers: Vec<Arc<dyn ChunkTransformer>>,
}

/// Name to factory map.
///
/// [`PluginRegistry::default`] knows the built-ins: `scan`
/// ([`ImportScanner`]), `commons` ([`CommonsChunk`]) and the `default`
/// generator. [`PluginRegistry::new`] starts empty.
#[derive(Clone)]
pub struct PluginRegistry {
    factories: IndexMap<String, Factory>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.factories.iter().map(|(name, factory)| (name, factory.kind())))
            .finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register_transformer(ImportScanner::NAME, |_| Arc::new(ImportScanner::new()));
        registry.register_chunk_transformer(CommonsChunk::NAME, |_| Arc::new(CommonsChunk));
        registry.register_generator(DefaultGenerator::NAME, |_| Arc::new(DefaultGenerator));
        registry
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Register a transformer. A later registration under the same name wins.
    pub fn register_transformer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BaleConfig) -> Arc<dyn Transformer> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Factory::Transformer(Arc::new(factory)));
        self
    }

    pub fn register_resolver<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BaleConfig) -> Arc<dyn Resolver> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Factory::Resolver(Arc::new(factory)));
        self
    }

    pub fn register_chunk_transformer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BaleConfig) -> Arc<dyn ChunkTransformer> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Factory::ChunkTransformer(Arc::new(factory)));
        self
    }

    pub fn register_generator<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BaleConfig) -> Arc<dyn Generator> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Factory::Generator(Arc::new(factory)));
        self
    }

    pub fn kind(&self, name: &str) -> Option<PluginKind> {
        self.factories.get(name).map(Factory::kind)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate every plugin `config` names.
    ///
    /// `chunking.commons` implies `commons` when it is not listed. Generators
    /// are not listed in `plugins`; see [`PluginRegistry::generator`].
    pub fn resolve(&self, config: &BaleConfig) -> Result<ResolvedPlugins> {
        let mut names: Vec<&str> = config.plugins.iter().map(String::as_str).collect();
        if config.chunking.commons && !names.contains(&CommonsChunk::NAME) {
            names.push(CommonsChunk::NAME);
        }

        let mut resolved = ResolvedPlugins::default();
        for name in names {
            match self.factories.get(name) {
                Some(Factory::Transformer(factory)) => resolved.transformers.push(factory(config)),
                Some(Factory::Resolver(factory)) => resolved.resolvers.push(factory(config)),
                Some(Factory::ChunkTransformer(factory)) => {
                    resolved.chunk_transformers.push(factory(config))
                }
                Some(Factory::Generator(_)) => {
                    return Err(Error::InvalidConfig(format!(
                        "'{}' is a generator and cannot be listed in plugins",
                        name
                    )));
                }
                None => return Err(unknown(name)),
            }
        }

        tracing::debug!(
            transformers = resolved.transformers.len(),
            resolvers = resolved.resolvers.len(),
            chunk_transformers = resolved.chunk_transformers.len(),
            "resolved plugins"
        );
        Ok(resolved)
    }

    /// Instantiate the generator registered as `name`.
    pub fn generator(&self, name: &str, config: &BaleConfig) -> Result<Arc<dyn Generator>> {
        match self.factories.get(name) {
            Some(Factory::Generator(factory)) => Ok(factory(config)),
            Some(other) => Err(Error::InvalidConfig(format!(
                "'{}' is a {:?}, not a generator",
                name,
                other.kind()
            ))),
            None => Err(unknown(name)),
        }
    }
}

fn unknown(name: &str) -> Error {
    Error::InvalidConfig(format!("unknown plugin '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(plugins: &[&str]) -> BaleConfig {
        BaleConfig {
            plugins: plugins.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_know_the_builtins() {
        let registry = PluginRegistry::default();
        assert_eq!(registry.kind("scan"), Some(PluginKind::Transformer));
        assert_eq!(registry.kind("commons"), Some(PluginKind::ChunkTransformer));
        assert_eq!(registry.kind("default"), Some(PluginKind::Generator));
        assert!(PluginRegistry::new().is_empty());
    }

    #[test]
    fn resolves_plugins_in_configuration_order() {
        let resolved = PluginRegistry::default()
            .resolve(&config(&["commons", "scan"]))
            .unwrap();
        assert_eq!(resolved.transformers.len(), 1);
        assert_eq!(resolved.chunk_transformers[0].name(), "commons");
    }

    #[test]
    fn commons_option_adds_the_transformer_once() {
        let mut cfg = config(&["scan"]);
        cfg.chunking.commons = true;
        let resolved = PluginRegistry::default().resolve(&cfg).unwrap();
        assert_eq!(resolved.chunk_transformers.len(), 1);

        cfg.plugins.push("commons".into());
        let resolved = PluginRegistry::default().resolve(&cfg).unwrap();
        assert_eq!(resolved.chunk_transformers.len(), 1);
    }

    #[test]
    fn unknown_names_are_invalid_config() {
        let err = PluginRegistry::default()
            .resolve(&config(&["babel"]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("babel")));

        let err = PluginRegistry::default()
            .generator("scan", &BaleConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
