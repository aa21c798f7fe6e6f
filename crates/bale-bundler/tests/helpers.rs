//! Shared test utilities for bale-bundler tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bale_bundler::{
    BaleConfig, Bundle, Bundler, MemoryFileStore, NativeFileStore, PluginRegistry, SourceMap,
};

pub const ROOT: &str = "/project";

/// Config rooted at [`ROOT`] with the given entries.
pub fn config(entries: &[&str]) -> BaleConfig {
    BaleConfig {
        root_directory: PathBuf::from(ROOT),
        entries: entries.iter().map(PathBuf::from).collect(),
        ..Default::default()
    }
}

/// In-memory project; paths are relative to [`ROOT`].
pub fn store(files: &[(&str, &str)]) -> MemoryFileStore {
    let store = MemoryFileStore::new(ROOT);
    for (path, contents) in files {
        store.insert(path, *contents);
    }
    store
}

pub fn bundler(config: BaleConfig, store: &MemoryFileStore) -> Bundler {
    Bundler::with_store(config, &PluginRegistry::default(), Arc::new(store.clone()))
        .expect("bundler")
}

/// Bundler over the real filesystem, rooted at `dir`.
pub fn native_bundler(dir: &Path, entries: &[&str]) -> Bundler {
    let config = BaleConfig {
        root_directory: dir.to_path_buf(),
        entries: entries.iter().map(PathBuf::from).collect(),
        ..Default::default()
    };
    Bundler::with_store(config, &PluginRegistry::default(), Arc::new(NativeFileStore::new()))
        .expect("bundler")
}

/// Whether a `node` binary is on the PATH.
pub fn node_available() -> bool {
    let output = std::process::Command::new("node").arg("--version").output();
    matches!(output, Ok(out) if out.status.success())
}

/// Write a project into `dir`.
pub fn write_project(dir: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = dir.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dir");
        }
        std::fs::write(path, contents).expect("write file");
    }
}

/// Zero-based line of the first line of `contents` containing `needle`.
pub fn line_of(contents: &str, needle: &str) -> u32 {
    contents
        .lines()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("'{}' not found in:\n{}", needle, contents)) as u32
}

/// Generated lines mapped to the source named `source`, in order.
pub fn mapped_lines(map: &SourceMap, source: &str) -> Vec<u32> {
    map.get_tokens()
        .filter(|token| {
            token
                .get_source_id()
                .and_then(|id| map.get_source(id))
                .map(|name| name.to_string())
                .as_deref()
                == Some(source)
        })
        .map(|token| token.get_dst_line())
        .collect()
}

pub fn assert_bundle_contains(bundle: &Bundle, needle: &str) {
    assert!(
        bundle.contents.contains(needle),
        "Expected bundle {} to contain '{}'.\n{}",
        bundle.output_name,
        needle,
        bundle.contents
    );
}

pub fn assert_bundle_not_contains(bundle: &Bundle, needle: &str) {
    assert!(
        !bundle.contents.contains(needle),
        "Expected bundle {} NOT to contain '{}'.\n{}",
        bundle.output_name,
        needle,
        bundle.contents
    );
}
