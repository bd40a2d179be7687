//! Application options

use std::path::PathBuf;

use crate::logs::LogOptions;

/// Resolved options for one generation run
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Path to the YAML deployment specification
    pub config_path: PathBuf,

    pub logs: LogOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("release.yaml"),
            logs: LogOptions::default(),
        }
    }
}
