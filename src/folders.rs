//! # Folder Materializer
//!
//! Walks the compiled schema tree for a target entity and brings the
//! project's directory structure up to date: static folders are created
//! as-is, entity-bound nodes expand to one folder per matching record
//! fetched from the entity-data collaborator, and every directory created
//! for an entity is recorded in the path cache.
//!
//! ## Process
//!
//! 1. **Resolve the target**: the target's project is the target itself for
//!    `Project` entities, otherwise the record's `project` link.
//!
//! 2. **Walk each project root**: the walk is anchored at the root's storage
//!    project directory and carries the entities bound so far, so node
//!    filters can reference them via `$` tokens.
//!
//! 3. **Create what is missing**: directories that already exist are skipped
//!    entirely; schema leaf files are copied verbatim when absent.
//!
//! In preview mode nothing touches the filesystem or the cache; the report
//! carries the operations a real run would perform. Re-running against an
//! already-materialized entity processes zero folders.
//!
//! Creation is not transactional across directories: a failed directory is
//! reported per-entry and its subtree skipped while siblings proceed, and a
//! re-run completes the remainder. A path cache conflict, by contrast,
//! aborts the whole operation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::entity::{EntityRecord, EntityRef, EntitySource, Filter};
use crate::error::{Error, Result};
use crate::path_cache::PathCache;
use crate::roots::StorageRoots;
use crate::schema::{FilterDef, FolderSchema, NodeKind, SchemaNode};

/// One operation a materialization run performs (or, in preview, would
/// perform).
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    CreateFolder {
        path: PathBuf,
        /// The owning entity for entity-bound folders
        entity: Option<EntityRef>,
    },
    CopyFile {
        source: PathBuf,
        destination: PathBuf,
    },
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOp::CreateFolder { path, entity: Some(entity) } => {
                write!(f, "create folder {} for {}", path.display(), entity)
            }
            PendingOp::CreateFolder { path, entity: None } => {
                write!(f, "create folder {}", path.display())
            }
            PendingOp::CopyFile { destination, .. } => {
                write!(f, "copy file {}", destination.display())
            }
        }
    }
}

/// Outcome of one materialization run.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Folders processed (created, or pending creation in preview)
    pub processed: usize,
    /// Everything the run did or would do, in walk order
    pub operations: Vec<PendingOp>,
    /// Per-entry failures, with path context; siblings of a failed entry
    /// still proceed
    pub errors: Vec<String>,
}

/// Walks the schema tree and creates directories for a target entity.
pub struct Materializer<'a> {
    schema: &'a FolderSchema,
    roots: &'a StorageRoots,
    source: &'a dyn EntitySource,
}

impl<'a> Materializer<'a> {
    pub fn new(
        schema: &'a FolderSchema,
        roots: &'a StorageRoots,
        source: &'a dyn EntitySource,
    ) -> Self {
        Self {
            schema,
            roots,
            source,
        }
    }

    /// Report what materializing the entity would create, touching nothing.
    pub fn preview(&self, entity_type: &str, entity_id: i64) -> Result<MaterializeReport> {
        self.run(None, entity_type, entity_id)
    }

    /// Create missing directories for the entity and record path↔entity
    /// mappings in the cache.
    pub fn create(
        &self,
        cache: &mut PathCache,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<MaterializeReport> {
        self.run(Some(cache), entity_type, entity_id)
    }

    fn run(
        &self,
        cache: Option<&mut PathCache>,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<MaterializeReport> {
        let project = self.resolve_project(entity_type, entity_id)?;

        let mut bindings = Bindings::new();
        bindings.insert("Project".to_string(), project.clone());

        let mut walk = Walk {
            materializer: self,
            preview: cache.is_none(),
            cache,
            target_type: entity_type.to_string(),
            target_id: entity_id,
            report: MaterializeReport::default(),
        };

        for root_id in self.schema.roots() {
            let node = self.schema.node(*root_id);
            let NodeKind::Project { root_name } = &node.kind else {
                continue;
            };
            let project_dir = self.roots.get(root_name)?.to_path_buf();
            let project_ref = EntityRef::new(
                "Project",
                project.id,
                project.string_field("name").unwrap_or_default(),
            );
            if walk.ensure_folder(&project_dir, Some(&project_ref))? {
                walk.copy_files(node, &project_dir);
                walk.process_children(node, &project_dir, &bindings)?;
            }
        }

        Ok(walk.report)
    }

    /// The project record the target belongs to.
    fn resolve_project(&self, entity_type: &str, entity_id: i64) -> Result<EntityRecord> {
        let project_id = if entity_type == "Project" {
            entity_id
        } else {
            let records = self.source.fetch_entities(
                entity_type,
                &[Filter::number("id", entity_id)],
                &["project"],
            )?;
            let record = records.first().ok_or_else(|| Error::EntityData {
                message: format!("{} {} not found", entity_type, entity_id),
            })?;
            record
                .link_field("project")
                .ok_or_else(|| Error::EntityData {
                    message: format!("{} {} has no project link", entity_type, entity_id),
                })?
                .1
        };

        let records = self.source.fetch_entities(
            "Project",
            &[Filter::number("id", project_id)],
            &["name"],
        )?;
        records.into_iter().next().ok_or_else(|| Error::EntityData {
            message: format!("Project {} not found", project_id),
        })
    }
}

type Bindings = BTreeMap<String, EntityRecord>;

struct Walk<'a, 'c> {
    materializer: &'a Materializer<'a>,
    cache: Option<&'c mut PathCache>,
    preview: bool,
    target_type: String,
    target_id: i64,
    report: MaterializeReport,
}

impl Walk<'_, '_> {
    fn process_children(
        &mut self,
        node: &SchemaNode,
        parent_dir: &Path,
        bindings: &Bindings,
    ) -> Result<()> {
        let schema = self.materializer.schema;
        for child_id in &node.children {
            let child = schema.node(*child_id);
            match &child.kind {
                // enforced unreachable below the root at compile time
                NodeKind::Project { .. } => continue,
                NodeKind::Static => {
                    let dir = parent_dir.join(&child.name);
                    if self.ensure_folder(&dir, None)? {
                        self.copy_files(child, &dir);
                        self.process_children(child, &dir, bindings)?;
                    }
                }
                NodeKind::UserWorkspace => {
                    let dir = parent_dir.join(current_user());
                    if self.ensure_folder(&dir, None)? {
                        self.copy_files(child, &dir);
                        self.process_children(child, &dir, bindings)?;
                    }
                }
                NodeKind::Entity(entity) => {
                    self.expand_entity(
                        child,
                        parent_dir,
                        bindings,
                        &entity.entity_type,
                        &entity.name_field,
                        &entity.filters,
                    )?;
                }
                NodeKind::Step(step) => {
                    self.expand_entity(
                        child,
                        parent_dir,
                        bindings,
                        "Step",
                        &step.name_field,
                        &step.filters,
                    )?;
                }
                NodeKind::Task(task) => {
                    self.expand_entity(
                        child,
                        parent_dir,
                        bindings,
                        "Task",
                        &task.name_field,
                        &task.filters,
                    )?;
                }
                NodeKind::ListField { entity_type, field } => {
                    self.expand_list_field(child, parent_dir, bindings, entity_type, field)?;
                }
            }
        }
        Ok(())
    }

    /// One folder per matching record, bound into the cache and the walk
    /// context. A node of the target's own type expands to the target only.
    fn expand_entity(
        &mut self,
        node: &SchemaNode,
        parent_dir: &Path,
        bindings: &Bindings,
        entity_type: &str,
        name_field: &str,
        filter_defs: &[FilterDef],
    ) -> Result<()> {
        let Some(mut filters) = resolve_filters(node, filter_defs, bindings) else {
            return Ok(());
        };
        if entity_type == self.target_type {
            filters.push(Filter::number("id", self.target_id));
        }

        let records =
            self.materializer
                .source
                .fetch_entities(entity_type, &filters, &[name_field])?;

        for record in records {
            let Some(raw_name) = record.string_field(name_field) else {
                warn!(
                    "{} {} has no value for '{}', skipping folder under '{}'",
                    entity_type,
                    record.id,
                    name_field,
                    parent_dir.display()
                );
                continue;
            };
            let name = clean_folder_name(raw_name);
            if name.is_empty() {
                warn!(
                    "{} {} has an empty '{}', skipping folder under '{}'",
                    entity_type,
                    record.id,
                    name_field,
                    parent_dir.display()
                );
                continue;
            }

            let dir = parent_dir.join(&name);
            let entity_ref = EntityRef::new(entity_type, record.id, &name);
            if self.ensure_folder(&dir, Some(&entity_ref))? {
                let mut child_bindings = bindings.clone();
                child_bindings.insert(entity_type.to_string(), record);
                self.copy_files(node, &dir);
                self.process_children(node, &dir, &child_bindings)?;
            }
        }
        Ok(())
    }

    /// One folder per distinct value of an entity field.
    fn expand_list_field(
        &mut self,
        node: &SchemaNode,
        parent_dir: &Path,
        bindings: &Bindings,
        entity_type: &str,
        field: &str,
    ) -> Result<()> {
        let records = self
            .materializer
            .source
            .fetch_entities(entity_type, &[], &[field])?;

        let mut values = BTreeSet::new();
        for record in &records {
            match record.fields.get(field) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => {
                    values.insert(s.clone());
                }
                Some(serde_json::Value::Number(n)) => {
                    values.insert(n.to_string());
                }
                _ => {}
            }
        }

        for value in values {
            let dir = parent_dir.join(clean_folder_name(&value));
            if self.ensure_folder(&dir, None)? {
                self.copy_files(node, &dir);
                self.process_children(node, &dir, bindings)?;
            }
        }
        Ok(())
    }

    /// Record, and outside preview create, one missing directory.
    ///
    /// Returns whether the walk should descend into the directory; a failed
    /// creation is reported and its subtree skipped while siblings proceed.
    fn ensure_folder(&mut self, dir: &Path, entity: Option<&EntityRef>) -> Result<bool> {
        if dir.exists() {
            return Ok(true);
        }

        self.report.operations.push(PendingOp::CreateFolder {
            path: dir.to_path_buf(),
            entity: entity.cloned(),
        });
        self.report.processed += 1;

        if self.preview {
            return Ok(true);
        }

        if let Err(e) = std::fs::create_dir(dir) {
            // another process may have won the race, which is fine
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                self.report
                    .errors
                    .push(format!("{}: {}", dir.display(), e));
                return Ok(false);
            }
        }

        if let (Some(entity), Some(cache)) = (entity, self.cache.as_deref_mut()) {
            cache.add_mapping(entity, dir)?;
        }
        Ok(true)
    }

    /// Copy the node's verbatim leaf files into its materialized directory.
    fn copy_files(&mut self, node: &SchemaNode, dir: &Path) {
        for source in &node.files {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let destination = dir.join(file_name);
            if destination.exists() {
                continue;
            }

            self.report.operations.push(PendingOp::CopyFile {
                source: source.clone(),
                destination: destination.clone(),
            });

            if !self.preview {
                if let Err(e) = std::fs::copy(source, &destination) {
                    self.report
                        .errors
                        .push(format!("{}: {}", destination.display(), e));
                }
            }
        }
    }
}

/// Resolve filter definitions against the walk's bound entities.
///
/// Returns `None` (and warns) when a `$` token references an entity type
/// not bound above this node, in which case the node cannot expand on
/// this branch.
fn resolve_filters(
    node: &SchemaNode,
    defs: &[FilterDef],
    bindings: &Bindings,
) -> Option<Vec<Filter>> {
    let mut filters = Vec::with_capacity(defs.len());
    for def in defs {
        match &def.value {
            serde_yaml::Value::String(s) if s.starts_with('$') => {
                let token = &s[1..];
                let record = bindings
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(token))
                    .map(|(_, v)| v);
                match record {
                    Some(record) => filters.push(Filter::link(
                        &def.field,
                        &record.entity_type,
                        record.id,
                    )),
                    None => {
                        warn!(
                            "filter '{}' in '{}' references '{}' which is not bound above this node",
                            def.field,
                            node.schema_path.display(),
                            s
                        );
                        return None;
                    }
                }
            }
            serde_yaml::Value::String(s) => filters.push(Filter::text(&def.field, s)),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(n) => filters.push(Filter::number(&def.field, n)),
                None => {
                    warn!(
                        "filter '{}' in '{}' has a non-integer numeric value, skipping node",
                        def.field,
                        node.schema_path.display()
                    );
                    return None;
                }
            },
            other => {
                warn!(
                    "filter '{}' in '{}' has unsupported value {:?}, skipping node",
                    def.field,
                    node.schema_path.display(),
                    other
                );
                return None;
            }
        }
    }
    Some(filters)
}

/// Replace anything outside `[A-Za-z0-9._-]` so entity names are safe as
/// folder names.
fn clean_folder_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The login name of the current process user.
fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
