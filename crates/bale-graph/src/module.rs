use std::sync::Arc;

use indexmap::IndexMap;
use oxc_sourcemap::SourceMap;

use crate::module_id::ModuleId;

/// A compiled module as stored in the graph registry.
///
/// Modules are immutable once committed; recompiling a file replaces the
/// `Arc<Module>` in the registry, so chunks built from an older graph keep
/// seeing the version they were built with.
#[derive(Debug, Clone)]
pub struct Module {
    /// Unique key: absolute normalized path.
    pub id: ModuleId,
    /// Raw source text as read from the store.
    pub sources: String,
    /// Compiled output text.
    pub contents: String,
    /// Source map from `contents` back to `sources`, when a transformer produced one.
    pub source_map: Option<Arc<SourceMap>>,
    /// Resolved imports in discovery order. Never contains `id`.
    pub imports: Vec<ModuleId>,
    /// Import requests as written in the source, and what each resolved to.
    pub requests: IndexMap<String, ModuleId>,
}

impl Module {
    pub fn new(id: ModuleId, sources: impl Into<String>) -> Self {
        let sources = sources.into();
        Self {
            id,
            contents: sources.clone(),
            sources,
            source_map: None,
            imports: Vec::new(),
            requests: IndexMap::new(),
        }
    }

    /// Set the import list, dropping self-references and duplicates.
    pub fn with_imports(mut self, imports: impl IntoIterator<Item = ModuleId>) -> Self {
        let mut seen = rustc_hash::FxHashSet::default();
        self.imports = imports
            .into_iter()
            .filter(|import| *import != self.id && seen.insert(import.clone()))
            .collect();
        self
    }

    pub fn with_requests(
        mut self,
        requests: impl IntoIterator<Item = (String, ModuleId)>,
    ) -> Self {
        self.requests = requests.into_iter().collect();
        self
    }

    /// Whether `other` differs in topology (the import list).
    pub fn imports_changed(&self, other: &Module) -> bool {
        self.imports != other.imports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    #[test]
    fn imports_never_contain_self() {
        let module = Module::new(id("/p/a.js"), "").with_imports([
            id("/p/b.js"),
            id("/p/a.js"),
            id("/p/c.js"),
            id("/p/b.js"),
        ]);
        assert_eq!(module.imports, vec![id("/p/b.js"), id("/p/c.js")]);
    }

    #[test]
    fn import_order_is_part_of_topology() {
        let a = Module::new(id("/p/a.js"), "").with_imports([id("/p/b.js"), id("/p/c.js")]);
        let b = Module::new(id("/p/a.js"), "").with_imports([id("/p/c.js"), id("/p/b.js")]);
        assert!(a.imports_changed(&b));
        assert!(!a.imports_changed(&a.clone()));
    }

    #[test]
    fn requests_are_keyed_by_request_string() {
        let module = Module::new(id("/p/a.js"), "").with_requests([
            ("./b".to_string(), id("/p/b.js")),
            ("lodash".to_string(), id("/p/node_modules/lodash/lodash.js")),
            ("./b".to_string(), id("/p/b.js")),
        ]);
        assert_eq!(module.requests.len(), 2);
        assert_eq!(module.requests["lodash"], id("/p/node_modules/lodash/lodash.js"));
    }
}
