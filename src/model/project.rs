use std::path::PathBuf;

use super::config::ProjectConfig;

/// A discovered tasklane project (the board itself lives in the store)
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of `tasklane/`)
    pub root: PathBuf,
    /// Path to the `tasklane/` directory
    pub data_dir: PathBuf,
    /// Parsed project.toml
    pub config: ProjectConfig,
}
