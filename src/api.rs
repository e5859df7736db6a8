//! # Project API
//!
//! [`Pipeline`] is the per-project entry point: it loads the storage roots,
//! the template registry and the folder schema from the project's
//! `.pipeline/` configuration, and exposes the path↔entity operations the
//! surrounding tooling builds on. Template matching and rendering are pure
//! and safely callable concurrently; the path cache is opened per call, the
//! way independent processes on a shared volume use it.

use std::path::{Path, PathBuf};

use crate::defaults;
use crate::entity::{EntityRef, EntitySource};
use crate::error::{Error, Result};
use crate::folders::{Materializer, MaterializeReport};
use crate::path_cache::PathCache;
use crate::roots::StorageRoots;
use crate::schema::FolderSchema;
use crate::template::{search, FieldSet, Template, TemplateRegistry};

/// Per-project handle over templates, schema, roots and the path cache.
pub struct Pipeline {
    project_path: PathBuf,
    roots: StorageRoots,
    templates: TemplateRegistry,
    schema: FolderSchema,
}

impl Pipeline {
    /// Load a project's pipeline configuration.
    ///
    /// Expects `templates.yml`, the `schema/` directory and optionally
    /// `roots.yml` under `<project>/.pipeline/config/`.
    pub fn open(project_path: &Path) -> Result<Self> {
        let roots = StorageRoots::load(project_path, &defaults::roots_file(project_path))?;

        let templates_file = defaults::templates_file(project_path);
        if !templates_file.exists() {
            return Err(Error::Config {
                message: format!("project has no template configuration at '{}'", templates_file.display()),
                hint: Some("create .pipeline/config/templates.yml".to_string()),
            });
        }
        let templates = TemplateRegistry::from_file(&templates_file, &roots)?;

        let schema = FolderSchema::compile(&defaults::schema_dir(project_path))?;

        Ok(Self {
            project_path: project_path.to_path_buf(),
            roots,
            templates,
            schema,
        })
    }

    /// Path to the primary root directory for the project.
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn schema(&self) -> &FolderSchema {
        &self.schema
    }

    /// Find the single template matching a path.
    ///
    /// `Ok(None)` when nothing matches; `AmbiguousTemplate` when more than
    /// one does.
    pub fn template_from_path(&self, path: &Path) -> Result<Option<&Template>> {
        self.templates.template_from_path(path)
    }

    /// Find on-disk paths matching a template under partially bound fields.
    pub fn paths_from_template(
        &self,
        template: &Template,
        fields: &FieldSet,
        skip_keys: &[&str],
    ) -> Result<Vec<PathBuf>> {
        search::paths_from_template(template, fields, skip_keys)
    }

    /// Find abstract paths for a template (frame expressions and similar).
    pub fn abstract_paths_from_template(
        &self,
        template: &Template,
        fields: &FieldSet,
    ) -> Result<Vec<PathBuf>> {
        search::abstract_paths_from_template(template, fields)
    }

    /// All paths the path cache records for an entity.
    pub fn paths_from_entity(&self, entity_type: &str, entity_id: i64) -> Result<Vec<PathBuf>> {
        let cache = PathCache::open(&self.project_path)?;
        cache.get_paths(entity_type, entity_id)
    }

    /// The entity the path cache records for a path, if any.
    pub fn entity_from_path(&self, path: &Path) -> Result<Option<EntityRef>> {
        let cache = PathCache::open(&self.project_path)?;
        cache.get_entity(path)
    }

    /// Create folders on disk for an entity per the schema tree, recording
    /// path↔entity associations in the path cache.
    pub fn create_structure(
        &self,
        source: &dyn EntitySource,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<MaterializeReport> {
        let mut cache = PathCache::open(&self.project_path)?;
        Materializer::new(&self.schema, &self.roots, source).create(
            &mut cache,
            entity_type,
            entity_id,
        )
    }

    /// Report the folders `create_structure` would create, touching neither
    /// the filesystem nor the cache.
    pub fn preview_structure(
        &self,
        source: &dyn EntitySource,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<MaterializeReport> {
        Materializer::new(&self.schema, &self.roots, source).preview(entity_type, entity_id)
    }
}
