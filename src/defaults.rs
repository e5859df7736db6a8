//! Default values for the project-local pipeline layout.
//!
//! This module provides centralized constants and path helpers used across
//! the crate, ensuring consistency and avoiding duplication. All state is
//! project-local: everything lives under `<project>/.pipeline/`.

use std::path::{Path, PathBuf};

/// Name of the project-local pipeline directory.
pub const PIPELINE_DIR: &str = ".pipeline";

/// Name of the storage root that every project must define.
pub const PRIMARY_ROOT_NAME: &str = "primary";

/// File name of the ignore pattern list at the schema root.
pub const IGNORE_FILES: &str = "ignore_files";

/// Extension used by schema node metadata files.
pub const METADATA_EXT: &str = "yml";

/// Returns the configuration directory for a project.
pub fn config_dir(project_path: &Path) -> PathBuf {
    project_path.join(PIPELINE_DIR).join("config")
}

/// Returns the template definition file for a project.
pub fn templates_file(project_path: &Path) -> PathBuf {
    config_dir(project_path).join("templates.yml")
}

/// Returns the storage roots file for a project.
pub fn roots_file(project_path: &Path) -> PathBuf {
    config_dir(project_path).join("roots.yml")
}

/// Returns the folder schema directory for a project.
pub fn schema_dir(project_path: &Path) -> PathBuf {
    config_dir(project_path).join("schema")
}

/// Returns the path cache database location for a project.
pub fn path_cache_file(project_path: &Path) -> PathBuf {
    project_path
        .join(PIPELINE_DIR)
        .join("cache")
        .join("path_cache.db")
}
