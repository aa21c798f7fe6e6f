use bale_config::PathType;
use bale_graph::{ModuleId, PathMapper};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Assigns the public path a module is registered under at runtime.
///
/// In [`PathType::Number`] mode ids are handed out on first sight and kept
/// for the lifetime of this value, so rebuilding a chunk in watch mode keeps
/// every module's number.
#[derive(Debug, Default)]
pub struct PublicPaths {
    path_type: PathType,
    numbers: Mutex<FxHashMap<ModuleId, u32>>,
}

impl PublicPaths {
    pub fn new(path_type: PathType) -> Self {
        Self {
            path_type,
            numbers: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn get(&self, paths: &PathMapper, id: &ModuleId) -> String {
        match self.path_type {
            PathType::FilePath => paths.public_path(id),
            PathType::Number => {
                let mut numbers = self.numbers.lock();
                let next = numbers.len() as u32;
                numbers.entry(id.clone()).or_insert(next).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    #[test]
    fn file_paths_are_rooted() {
        let paths = PathMapper::new("/p");
        let public = PublicPaths::new(PathType::FilePath);
        assert_eq!(public.get(&paths, &id("/p/src/a.js")), "$root/src/a.js");
    }

    #[test]
    fn numbers_are_stable_per_instance() {
        let paths = PathMapper::new("/p");
        let public = PublicPaths::new(PathType::Number);
        assert_eq!(public.get(&paths, &id("/p/b.js")), "0");
        assert_eq!(public.get(&paths, &id("/p/a.js")), "1");
        assert_eq!(public.get(&paths, &id("/p/b.js")), "0");

        let fresh = PublicPaths::new(PathType::Number);
        assert_eq!(fresh.get(&paths, &id("/p/a.js")), "0");
    }
}
