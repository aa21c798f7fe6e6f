use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::error::CompileError;
use crate::module::Module;
use crate::module_id::ModuleId;

pub(crate) type Registry = IndexMap<ModuleId, Arc<Module>>;

/// How a traversal treats ids that are missing from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Fail with [`CompileError::ModuleNotFound`].
    Error,
    /// Skip the id. Used by the garbage collector's mark phase.
    Skip,
}

/// Depth-first walk over the registry in import discovery order.
///
/// The same context is reused for every root so a module reachable from
/// several entries is visited once. The walk keeps its own stack; deep
/// import chains do not grow the call stack.
pub struct Traversal<'a> {
    registry: &'a Registry,
    missing: Missing,
    visited: FxHashSet<ModuleId>,
    modules: Vec<Arc<Module>>,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(registry: &'a Registry, missing: Missing) -> Self {
        Self {
            registry,
            missing,
            visited: FxHashSet::default(),
            modules: Vec::new(),
        }
    }

    /// Visit `root` and everything it imports that has not been seen yet.
    pub fn visit(&mut self, root: &ModuleId) -> Result<(), CompileError> {
        let mut stack = vec![root.clone()];

        while let Some(id) = stack.pop() {
            if self.visited.contains(&id) {
                continue;
            }
            let Some(module) = self.registry.get(&id) else {
                match self.missing {
                    Missing::Error => return Err(CompileError::ModuleNotFound(id)),
                    Missing::Skip => continue,
                }
            };

            self.visited.insert(id);
            self.modules.push(module.clone());

            // Reversed so the first import is popped first.
            stack.extend(
                module
                    .imports
                    .iter()
                    .rev()
                    .filter(|import| !self.visited.contains(*import))
                    .cloned(),
            );
        }
        Ok(())
    }

    pub fn visited(&self) -> &FxHashSet<ModuleId> {
        &self.visited
    }

    pub fn into_modules(self) -> Vec<Arc<Module>> {
        self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(format!("/p/{name}.js")).unwrap()
    }

    fn registry(edges: Vec<(&str, Vec<&str>)>) -> Registry {
        edges
            .into_iter()
            .map(|(name, imports)| {
                let module =
                    Module::new(id(name), "").with_imports(imports.into_iter().map(id));
                (id(name), Arc::new(module))
            })
            .collect()
    }

    fn names(modules: Vec<Arc<Module>>) -> Vec<String> {
        modules
            .iter()
            .map(|m| m.id.as_path().file_stem().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn preorder_in_discovery_order() {
        let reg = registry(vec![
            ("a", vec!["b", "c"]),
            ("b", vec!["d"]),
            ("c", vec!["d"]),
            ("d", vec![]),
        ]);
        let mut t = Traversal::new(&reg, Missing::Error);
        t.visit(&id("a")).unwrap();
        assert_eq!(names(t.into_modules()), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn cycles_terminate_and_visit_once() {
        let reg = registry(vec![("a", vec!["b"]), ("b", vec!["c"]), ("c", vec!["a", "b"])]);
        let mut t = Traversal::new(&reg, Missing::Error);
        t.visit(&id("a")).unwrap();
        t.visit(&id("b")).unwrap();
        assert_eq!(names(t.into_modules()), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_modules_fail_or_skip() {
        let reg = registry(vec![("a", vec!["ghost", "b"]), ("b", vec![])]);

        let mut strict = Traversal::new(&reg, Missing::Error);
        let err = strict.visit(&id("a")).unwrap_err();
        assert!(matches!(err, CompileError::ModuleNotFound(ref m) if *m == id("ghost")));

        let mut lenient = Traversal::new(&reg, Missing::Skip);
        lenient.visit(&id("a")).unwrap();
        assert_eq!(names(lenient.into_modules()), vec!["a", "b"]);
    }
}
