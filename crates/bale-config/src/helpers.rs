use std::path::PathBuf;

// Helper defaults
pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_root_directory() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_namespace() -> String {
    "app".to_string()
}

pub(crate) fn default_wrapper() -> String {
    "normal".to_string()
}

pub(crate) fn default_plugins() -> Vec<String> {
    vec!["scan".to_string()]
}

pub(crate) fn default_extensions() -> Vec<String> {
    ["js", "mjs", "cjs", "json"].iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_install_command() -> String {
    "npm".to_string()
}

pub(crate) fn default_install_exclude() -> Vec<String> {
    vec!["(node_modules|bower_components)".to_string()]
}

pub(crate) fn default_watch_ignored() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/.git/**".to_string()]
}

pub(crate) fn default_debounce_ms() -> u64 {
    50
}
