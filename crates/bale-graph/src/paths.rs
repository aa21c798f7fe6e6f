//! Mapping between module ids, filesystem paths and public paths.
//!
//! Public paths are what the generated bundle sees. They are rooted at the
//! `$root` token so a bundle never leaks the absolute location of the project.

use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

use crate::module_id::{ModuleId, ModuleIdError};

/// Token that stands in for the project root in public paths.
pub const ROOT_TOKEN: &str = "$root";

/// Converts between the three path spaces used by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    root: PathBuf,
}

impl PathMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self { root: root.clean() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a user-facing path to a module id.
    ///
    /// Accepts `$root/...` public paths, paths relative to the root and
    /// absolute paths.
    pub fn to_id(&self, path: impl AsRef<Path>) -> Result<ModuleId, ModuleIdError> {
        let path = path.as_ref();
        let text = path.to_string_lossy();
        if let Some(rest) = text.strip_prefix(ROOT_TOKEN) {
            let rest = rest.trim_start_matches(['/', '\\']);
            return ModuleId::from_root(&self.root, rest);
        }
        ModuleId::from_root(&self.root, path)
    }

    /// Filesystem path of a module.
    pub fn to_path(&self, id: &ModuleId) -> PathBuf {
        id.as_path().to_path_buf()
    }

    /// Path of `id` relative to the root, always with `/` separators.
    pub fn relative(&self, id: &ModuleId) -> String {
        relative_path(&self.root, id.as_path())
    }

    /// Public path of `id`, e.g. `$root/src/index.js`.
    pub fn public_path(&self, id: &ModuleId) -> String {
        format!("{}/{}", ROOT_TOKEN, self.relative(id))
    }
}

/// Lexical relative path from `base` to `target`, joined with `/`.
pub fn relative_path(base: &Path, target: &Path) -> String {
    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}
