//! Resolver that installs missing packages.
//!
//! The resolver only acts on bare requests that no other resolver can
//! answer. Installation runs under the layer's resolution lock keyed by the
//! package name, so a project importing `lodash/map` and `lodash/filter` in
//! parallel runs a single `npm install lodash`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::fs::is_path_request;
use super::{ResolveContext, Resolver};
use crate::error::ResolveError;
use crate::module_id::ModuleId;
use crate::paths::relative_path;

/// Default pattern for importers that never trigger an install.
pub const DEFAULT_EXCLUDE: &str = "(node_modules|bower_components)";

/// Something that can put a package into the project.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, package: &str, save: bool, root: &Path) -> Result<(), ResolveError>;
}

/// Installer that shells out to a package manager (`npm install <name>`).
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: String,
}

impl Default for CommandInstaller {
    fn default() -> Self {
        Self::new("npm")
    }
}

impl CommandInstaller {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Installer for CommandInstaller {
    async fn install(&self, package: &str, save: bool, root: &Path) -> Result<(), ResolveError> {
        let mut command = tokio::process::Command::new(&self.command);
        command
            .arg("install")
            .arg(package)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if save {
            command.arg("--save");
        }

        let output = command.output().await.map_err(|err| ResolveError::Install {
            package: package.to_string(),
            reason: format!("failed to spawn {}: {}", self.command, err),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty());
            Err(ResolveError::Install {
                package: package.to_string(),
                reason: match last_line {
                    Some(line) => format!("{} ({})", output.status, line.trim()),
                    None => output.status.to_string(),
                },
            })
        }
    }
}

pub type BeforeInstall = Arc<dyn Fn(&str) + Send + Sync>;
pub type AfterInstall = Arc<dyn Fn(&str, Option<&ResolveError>) + Send + Sync>;

/// Options for [`InstallResolver`].
#[derive(Clone)]
pub struct InstallOptions {
    /// Pass `--save` to the installer.
    pub save: bool,
    /// Suppress install progress logging.
    pub silent: bool,
    /// Importer paths (relative to the root) that may trigger installs. Empty means all.
    pub include: Vec<String>,
    /// Importer paths that never trigger installs.
    pub exclude: Vec<String>,
    pub before_install: Option<BeforeInstall>,
    pub after_install: Option<AfterInstall>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            save: false,
            silent: false,
            include: Vec::new(),
            exclude: vec![DEFAULT_EXCLUDE.to_string()],
            before_install: None,
            after_install: None,
        }
    }
}

impl std::fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOptions")
            .field("save", &self.save)
            .field("silent", &self.silent)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

pub struct InstallResolver {
    installer: Arc<dyn Installer>,
    options: InstallOptions,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl InstallResolver {
    pub fn new(
        installer: Arc<dyn Installer>,
        options: InstallOptions,
    ) -> Result<Self, regex::Error> {
        let include = options
            .include
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = options
            .exclude
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            installer,
            options,
            include,
            exclude,
        })
    }

    fn should_process(&self, root: &Path, from: Option<&ModuleId>) -> bool {
        let Some(from) = from else {
            return true;
        };
        let relative = relative_path(root, from.as_path());
        if self.exclude.iter().any(|re| re.is_match(&relative)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(&relative))
    }
}

#[async_trait]
impl Resolver for InstallResolver {
    fn name(&self) -> &str {
        "install"
    }

    async fn resolve(
        &self,
        request: &str,
        from: Option<&ModuleId>,
        ctx: &ResolveContext,
    ) -> Result<Option<ModuleId>, ResolveError> {
        if request.starts_with('.') || is_path_request(request) {
            return Ok(None);
        }

        match ctx.resolve_others(request, from).await {
            Ok(id) => return Ok(Some(id)),
            Err(err) => tracing::trace!(request, error = %err, "not resolvable before install"),
        }

        if !self.should_process(ctx.root(), from) {
            return Ok(None);
        }

        let Some(package) = package_name(request) else {
            return Ok(None);
        };

        // Installed, but the request points at something the package lacks.
        if ctx
            .resolve_others(&format!("{}/package.json", package), from)
            .await
            .is_ok()
        {
            return Ok(None);
        }

        let attempt = {
            let installer = self.installer.clone();
            let options = self.options.clone();
            let ctx = ctx.clone();
            let package = package.to_string();
            let request = request.to_string();
            let from = from.cloned();
            let root: PathBuf = ctx.root().to_path_buf();
            async move {
                if !options.silent {
                    tracing::info!("Installing '{}' in {}", package, root.display());
                }
                if let Some(before) = &options.before_install {
                    before(&package);
                }

                let outcome = installer.install(&package, options.save, &root).await;

                if let Some(after) = &options.after_install {
                    after(&package, outcome.as_ref().err());
                }
                if !options.silent {
                    match &outcome {
                        Ok(()) => tracing::info!("Installed '{}' successfully", package),
                        Err(err) => tracing::error!("Failed to install '{}': {}", package, err),
                    }
                }

                let resolved = ctx.resolve_others(&request, from.as_ref()).await;
                match (outcome, resolved) {
                    (Err(install_err), Err(_)) => Err(install_err),
                    (_, resolved) => resolved,
                }
            }
        };

        ctx.layer().dedupe(package, attempt).await?;

        // Waiters may have joined with a different subpath of the same package.
        ctx.resolve_others(request, from).await.map(Some)
    }
}

/// Package name of a bare request: `lodash/map` -> `lodash`, `@a/b/c` -> `@a/b`.
pub fn package_name(request: &str) -> Option<&str> {
    let mut end = 0;
    let mut parts = request.split('/');
    let first = parts.next().filter(|s| !s.is_empty())?;
    end += first.len();
    if first.starts_with('@') {
        let second = parts.next().filter(|s| !s.is_empty())?;
        end += 1 + second.len();
    }
    Some(&request[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{FsResolver, ResolutionLayer};
    use crate::store::MemoryFileStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Installer that writes a package into the memory store.
    struct FakeInstaller {
        store: MemoryFileStore,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Installer for FakeInstaller {
        async fn install(&self, package: &str, _save: bool, root: &Path) -> Result<(), ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(ResolveError::Install {
                    package: package.to_string(),
                    reason: "registry unreachable".into(),
                });
            }
            let dir = root.join("node_modules").join(package);
            self.store.insert(dir.join("package.json"), "{}");
            self.store.insert(dir.join("index.js"), "module.exports = 1");
            self.store.insert(dir.join("map.js"), "module.exports = 2");
            Ok(())
        }
    }

    fn setup(fail: bool) -> (ResolutionLayer, Arc<FakeInstaller>, MemoryFileStore) {
        let store = MemoryFileStore::new("/project").with_file("/project/index.js", "");
        let installer = Arc::new(FakeInstaller {
            store: store.clone(),
            calls: AtomicUsize::new(0),
            fail,
        });
        let install = InstallResolver::new(installer.clone(), InstallOptions::default()).unwrap();
        let layer = ResolutionLayer::new(
            Arc::new(store.clone()),
            "/project",
            vec![Arc::new(FsResolver::default()), Arc::new(install)],
        );
        (layer, installer, store)
    }

    fn from() -> ModuleId {
        ModuleId::new("/project/index.js").unwrap()
    }

    #[test]
    fn package_names() {
        assert_eq!(package_name("lodash"), Some("lodash"));
        assert_eq!(package_name("lodash/map"), Some("lodash"));
        assert_eq!(package_name("@babel/core/lib/x"), Some("@babel/core"));
        assert_eq!(package_name("@babel"), None);
        assert_eq!(package_name(""), None);
    }

    #[tokio::test]
    async fn concurrent_requests_install_once() {
        let (layer, installer, _store) = setup(false);
        let from = from();

        let (a, b, c) = tokio::join!(
            layer.resolve("lodash", Some(&from)),
            layer.resolve("lodash/map", Some(&from)),
            layer.resolve("lodash", Some(&from)),
        );

        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().to_string(), "/project/node_modules/lodash/index.js");
        assert_eq!(b.unwrap().to_string(), "/project/node_modules/lodash/map.js");
        assert_eq!(c.unwrap().to_string(), "/project/node_modules/lodash/index.js");
        assert!(layer.pending_locks().is_empty());
    }

    #[tokio::test]
    async fn install_failure_is_shared() {
        let (layer, installer, _store) = setup(true);
        let from = from();

        let (a, b) = tokio::join!(
            layer.resolve("left-pad", Some(&from)),
            layer.resolve("left-pad", Some(&from)),
        );

        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);
        let a = a.unwrap_err();
        assert!(matches!(a, ResolveError::Install { .. }));
        assert_eq!(a, b.unwrap_err());
    }

    #[tokio::test]
    async fn relative_and_excluded_requests_never_install() {
        let (layer, installer, _store) = setup(false);
        let vendored = ModuleId::new("/project/node_modules/x/index.js").unwrap();

        assert!(layer.resolve("./missing", Some(&from())).await.is_err());
        assert!(layer.resolve("react", Some(&vendored)).await.is_err());
        assert_eq!(installer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hooks_observe_each_install() {
        let store = MemoryFileStore::new("/project");
        let installer = Arc::new(FakeInstaller {
            store: store.clone(),
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let options = InstallOptions {
            silent: true,
            before_install: Some({
                let seen = seen.clone();
                Arc::new(move |name: &str| seen.lock().push(format!("before {name}")))
            }),
            after_install: Some({
                let seen = seen.clone();
                Arc::new(move |name: &str, err: Option<&ResolveError>| {
                    seen.lock().push(format!("after {name} {}", err.is_some()))
                })
            }),
            ..InstallOptions::default()
        };
        let layer = ResolutionLayer::new(
            Arc::new(store.clone()),
            "/project",
            vec![
                Arc::new(FsResolver::default()),
                Arc::new(InstallResolver::new(installer, options).unwrap()),
            ],
        );

        layer.resolve("ms", None).await.unwrap();
        assert_eq!(*seen.lock(), vec!["before ms", "after ms false"]);
    }

    #[tokio::test]
    async fn installed_package_without_subpath_is_not_reinstalled() {
        let (layer, installer, store) = setup(false);
        store.insert("/project/node_modules/chalk/package.json", "{}");
        store.insert("/project/node_modules/chalk/index.js", "");

        let err = layer.resolve("chalk/missing", Some(&from())).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(installer.calls.load(Ordering::SeqCst), 0);
    }
}
