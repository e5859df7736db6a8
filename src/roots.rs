//! Storage roots for multi-volume projects.
//!
//! A project usually lives on one storage volume, but render or publish data
//! may sit on separate mounts. `roots.yml` maps a root name to a storage
//! directory; the per-root project directory is `<storage>/<project name>`,
//! where the project name is the basename of the primary project path. When
//! no roots file exists the project has exactly one root, `primary`, at the
//! project path itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::defaults::PRIMARY_ROOT_NAME;
use crate::error::{Error, Result};

/// Named project roots, resolved to per-root project directories.
#[derive(Debug, Clone)]
pub struct StorageRoots {
    roots: BTreeMap<String, PathBuf>,
}

impl StorageRoots {
    /// A single primary root at the given project path.
    pub fn single(project_path: &Path) -> Self {
        let mut roots = BTreeMap::new();
        roots.insert(PRIMARY_ROOT_NAME.to_string(), project_path.to_path_buf());
        Self { roots }
    }

    /// Load roots for a project from an optional `roots.yml`.
    ///
    /// A missing file yields a single primary root at the project path. A
    /// present file must contain a `primary` entry; each storage directory is
    /// joined with the project folder name.
    pub fn load(project_path: &Path, roots_file: &Path) -> Result<Self> {
        if !roots_file.exists() {
            return Ok(Self::single(project_path));
        }

        let content = std::fs::read_to_string(roots_file)?;
        let storages: BTreeMap<String, PathBuf> = serde_yaml::from_str(&content)?;

        if !storages.contains_key(PRIMARY_ROOT_NAME) {
            return Err(Error::Config {
                message: format!("'{}' defines no '{}' root", roots_file.display(), PRIMARY_ROOT_NAME),
                hint: Some(format!("add a '{}' entry to roots.yml", PRIMARY_ROOT_NAME)),
            });
        }

        let project_name = project_path
            .file_name()
            .ok_or_else(|| Error::Config {
                message: format!(
                    "cannot derive a project name from '{}'",
                    project_path.display()
                ),
                hint: None,
            })?
            .to_os_string();

        let roots = storages
            .into_iter()
            .map(|(name, storage)| (name, storage.join(&project_name)))
            .collect();
        Ok(Self { roots })
    }

    /// The primary project root.
    pub fn primary(&self) -> &Path {
        // construction guarantees the primary entry
        &self.roots[PRIMARY_ROOT_NAME]
    }

    /// Look up a root by name, failing with a `Config` error when undefined.
    pub fn get(&self, name: &str) -> Result<&Path> {
        self.roots.get(name).map(PathBuf::as_path).ok_or_else(|| Error::Config {
            message: format!("undefined storage root '{}'", name),
            hint: Some("define it in roots.yml".to_string()),
        })
    }

    /// True when a root with this name is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Iterate over `(name, project root)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roots.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }
}
