//! Global settings that do not affect the bundle itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`. Falls back to `RUST_LOG`.
    #[serde(default)]
    pub log_level: Option<String>,
}
