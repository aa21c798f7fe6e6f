//! Node-style filesystem resolution.
//!
//! 1. Relative (`./`, `../`) and absolute requests are joined to the
//!    importing file's directory (or the root for entries).
//! 2. Bare requests walk `node_modules` directories from the importer up to
//!    the filesystem root.
//! 3. Every candidate is tried as a file, with each configured extension,
//!    as a package directory (`package.json` `main`) and as `index.<ext>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use path_clean::PathClean;

use super::{ResolveContext, Resolver};
use crate::error::ResolveError;
use crate::module_id::ModuleId;
use crate::store::FileStore;

/// Default extensions probed after the exact path.
pub const DEFAULT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

#[derive(Debug, Clone)]
pub struct FsResolver {
    extensions: Vec<String>,
}

impl Default for FsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()))
    }
}

impl FsResolver {
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolve without going through a [`ResolutionLayer`](super::ResolutionLayer).
    pub async fn resolve_with(
        &self,
        store: &dyn FileStore,
        root: &Path,
        request: &str,
        from: Option<&ModuleId>,
    ) -> Result<Option<ModuleId>, ResolveError> {
        if request.is_empty() {
            return Ok(None);
        }

        let base = from.map(|id| id.dir().to_path_buf()).unwrap_or_else(|| root.to_path_buf());

        if is_path_request(request) {
            let candidate = if Path::new(request).is_absolute() {
                PathBuf::from(request).clean()
            } else {
                base.join(request).clean()
            };
            return self.load(store, &candidate).await;
        }

        for modules_dir in node_modules_dirs(&base) {
            let candidate = modules_dir.join(request).clean();
            if let Some(found) = self.load(store, &candidate).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn load(
        &self,
        store: &dyn FileStore,
        candidate: &Path,
    ) -> Result<Option<ModuleId>, ResolveError> {
        if let Some(file) = self.load_as_file(store, candidate).await? {
            return Ok(Some(ModuleId::new(file)?));
        }
        if let Some(file) = self.load_as_directory(store, candidate).await? {
            return Ok(Some(ModuleId::new(file)?));
        }
        Ok(None)
    }

    async fn load_as_file(
        &self,
        store: &dyn FileStore,
        candidate: &Path,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if is_file(store, candidate).await? {
            return Ok(Some(candidate.to_path_buf()));
        }
        for ext in &self.extensions {
            let with_ext = append_extension(candidate, ext);
            if is_file(store, &with_ext).await? {
                return Ok(Some(with_ext));
            }
        }
        Ok(None)
    }

    async fn load_as_directory(
        &self,
        store: &dyn FileStore,
        candidate: &Path,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if !is_dir(store, candidate).await? {
            return Ok(None);
        }

        let manifest = candidate.join("package.json");
        if is_file(store, &manifest).await? {
            if let Some(main) = read_main(store, &manifest).await? {
                let target = candidate.join(main).clean();
                if let Some(file) = self.load_as_file(store, &target).await? {
                    return Ok(Some(file));
                }
                if let Some(file) = self.load_index(store, &target).await? {
                    return Ok(Some(file));
                }
            }
        }

        self.load_index(store, candidate).await
    }

    async fn load_index(
        &self,
        store: &dyn FileStore,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ResolveError> {
        for ext in &self.extensions {
            let index = dir.join(format!("index.{}", ext));
            if is_file(store, &index).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Resolver for FsResolver {
    fn name(&self) -> &str {
        "fs"
    }

    async fn resolve(
        &self,
        request: &str,
        from: Option<&ModuleId>,
        ctx: &ResolveContext,
    ) -> Result<Option<ModuleId>, ResolveError> {
        self.resolve_with(ctx.store().as_ref(), ctx.root(), request, from)
            .await
    }
}

/// Whether `request` names a path rather than a package.
pub fn is_path_request(request: &str) -> bool {
    request == "."
        || request == ".."
        || request.starts_with("./")
        || request.starts_with("../")
        || Path::new(request).is_absolute()
        || request.starts_with('/')
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut text = path.as_os_str().to_os_string();
    text.push(".");
    text.push(ext);
    PathBuf::from(text)
}

fn node_modules_dirs(base: &Path) -> Vec<PathBuf> {
    base.ancestors()
        .filter(|dir| dir.file_name().is_none_or(|name| name != "node_modules"))
        .map(|dir| dir.join("node_modules"))
        .collect()
}

async fn is_file(store: &dyn FileStore, path: &Path) -> Result<bool, ResolveError> {
    match store.stat(path).await {
        Ok(meta) => Ok(meta.is_file),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn is_dir(store: &dyn FileStore, path: &Path) -> Result<bool, ResolveError> {
    match store.stat(path).await {
        Ok(meta) => Ok(meta.is_dir),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn read_main(store: &dyn FileStore, manifest: &Path) -> Result<Option<String>, ResolveError> {
    let text = store.read_file(manifest).await?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|err| ResolveError::Plugin {
        plugin: "fs".to_string(),
        message: format!("invalid {}: {}", manifest.display(), err),
    })?;
    Ok(json
        .get("main")
        .and_then(|main| main.as_str())
        .filter(|main| !main.is_empty())
        .map(str::to_string))
}
