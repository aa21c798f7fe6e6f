use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier of a module in the bale graph.
///
/// A module id is always an absolute, lexically normalized path. Two requests
/// that reach the same file through `./a/../b.js` and `./b.js` produce the
/// same id. Symlinks are deliberately not followed: the id is what the
/// resolver produced, not what the filesystem thinks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create a new module identifier from an absolute filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }
        if !is_rooted(path) {
            return Err(ModuleIdError::NotAbsolute(path.to_path_buf()));
        }

        Ok(Self(path.clean()))
    }

    /// Resolve `path` against `root` (when relative) and normalize it.
    pub fn from_root(root: &Path, path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }
        if is_rooted(path) {
            Self::new(path)
        } else {
            Self::new(root.join(path))
        }
    }

    /// Returns the underlying path representation.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume the identifier and return the owned path.
    pub fn into_path(self) -> PathBuf {
        self.0
    }

    /// Directory containing the module.
    pub fn dir(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }

    /// Borrow the identifier as a string for logging/serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }
}

// `Path::is_absolute` is false for `/foo` on Windows; ids only need a root.
fn is_rooted(path: &Path) -> bool {
    path.is_absolute() || matches!(path.components().next(), Some(Component::RootDir))
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl AsRef<Path> for ModuleId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ModuleId::new(value).map_err(serde::de::Error::custom)
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Clone, Error)]
pub enum ModuleIdError {
    /// The provided path was empty.
    #[error("module id path is empty")]
    EmptyPath,

    /// Module ids must be absolute.
    #[error("module id path '{0}' is not absolute")]
    NotAbsolute(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        let a = ModuleId::new("/project/src/../lib/a.js").unwrap();
        let b = ModuleId::new("/project/lib/./a.js").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_path(), Path::new("/project/lib/a.js"));
    }

    #[test]
    fn rejects_relative_and_empty_paths() {
        assert!(matches!(
            ModuleId::new("src/a.js"),
            Err(ModuleIdError::NotAbsolute(_))
        ));
        assert!(matches!(ModuleId::new(""), Err(ModuleIdError::EmptyPath)));
    }

    #[test]
    fn from_root_joins_relative_paths() {
        let id = ModuleId::from_root(Path::new("/project"), "./src/index.js").unwrap();
        assert_eq!(id.to_string(), "/project/src/index.js");
        assert_eq!(id.dir(), Path::new("/project/src"));

        let abs = ModuleId::from_root(Path::new("/project"), "/other/x.js").unwrap();
        assert_eq!(abs.as_path(), Path::new("/other/x.js"));
    }

    #[test]
    fn serde_round_trip_uses_plain_strings() {
        let id = ModuleId::new("/project/a.js").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/project/a.js\"");
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
