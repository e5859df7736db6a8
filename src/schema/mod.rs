//! # Folder Schema Tree
//!
//! Compiles the on-disk schema (one directory per folder node, an optional
//! sibling `<name>.yml` metadata file per directory, one `ignore_files`
//! pattern list at the schema root) into an in-memory tree of typed nodes.
//!
//! ## Layout
//!
//! ```text
//! schema/
//!   ignore_files
//!   project/                  <- project root (bare name defaults the type)
//!     sequences/
//!     sequences.yml           <- {type: static}
//!       sequence/
//!       sequence.yml          <- {type: entity, entity_type: Sequence}
//! ```
//!
//! Compilation is all-or-nothing: a malformed metadata file, an unknown node
//! type, or a non-project folder at the root aborts with a `Schema` error
//! citing the offending path, since no partial schema is usable. Directory
//! entries are processed in sorted order so compilation is deterministic.
//!
//! While compiling, entity-bound nodes are indexed by entity type and step
//! nodes are collected into a flat list, so the materializer never re-walks
//! the tree to answer "which nodes represent a Shot".

pub mod node;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use log::debug;

use crate::defaults::{IGNORE_FILES, METADATA_EXT, PRIMARY_ROOT_NAME};
use crate::error::{Error, Result};

pub use node::{EntityFolder, FilterDef, NodeId, NodeKind, SchemaNode, StepFolder, TaskFolder};

use node::NodeMetadata;

/// The compiled folder schema for a project.
#[derive(Debug)]
pub struct FolderSchema {
    nodes: Vec<SchemaNode>,
    roots: Vec<NodeId>,
    by_entity_type: BTreeMap<String, Vec<NodeId>>,
    steps: Vec<NodeId>,
}

impl FolderSchema {
    /// Compile the schema directory into a node tree.
    pub fn compile(schema_dir: &Path) -> Result<Self> {
        if !schema_dir.is_dir() {
            return Err(Error::Schema {
                path: schema_dir.to_path_buf(),
                message: "schema directory does not exist".to_string(),
            });
        }

        let ignore = read_ignore_files(schema_dir)?;
        let mut schema = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            by_entity_type: BTreeMap::new(),
            steps: Vec::new(),
        };

        for dir in sub_directories(schema_dir)? {
            let metadata = match read_metadata(&dir)? {
                Some(metadata) => metadata,
                None if file_name(&dir) == "project" => {
                    // bare 'project' folders keep working for schemas that
                    // predate per-folder metadata
                    NodeMetadata::Project {
                        root_name: PRIMARY_ROOT_NAME.to_string(),
                    }
                }
                None => {
                    return Err(Error::Schema {
                        path: dir.clone(),
                        message: format!(
                            "root-level folder is missing its required metadata file '{}.{}'",
                            file_name(&dir),
                            METADATA_EXT
                        ),
                    })
                }
            };

            let kind = metadata.into_kind();
            if !matches!(kind, NodeKind::Project { .. }) {
                return Err(Error::Schema {
                    path: dir.clone(),
                    message: "only folders of type 'project' are allowed at the root level"
                        .to_string(),
                });
            }

            let root_id = schema.add_node(None, &dir, kind);
            schema.roots.push(root_id);
            schema.index_entity_type("Project", root_id);
            schema.compile_children(root_id, &dir, &ignore)?;
        }

        if schema.roots.is_empty() {
            return Err(Error::Schema {
                path: schema_dir.to_path_buf(),
                message: "schema defines no project root".to_string(),
            });
        }

        debug!(
            "compiled schema '{}': {} nodes, {} project roots, {} step nodes",
            schema_dir.display(),
            schema.nodes.len(),
            schema.roots.len(),
            schema.steps.len()
        );
        Ok(schema)
    }

    fn compile_children(
        &mut self,
        parent_id: NodeId,
        parent_dir: &Path,
        ignore: &[Pattern],
    ) -> Result<()> {
        let child_dirs = sub_directories(parent_dir)?;

        for dir in &child_dirs {
            let kind = match read_metadata(dir)? {
                Some(metadata) => metadata.into_kind(),
                // no metadata file makes this a plain static folder
                None => NodeKind::Static,
            };
            if matches!(kind, NodeKind::Project { .. }) {
                return Err(Error::Schema {
                    path: dir.clone(),
                    message: "folders of type 'project' are only allowed at the root level"
                        .to_string(),
                });
            }

            let id = self.add_node(Some(parent_id), dir, kind);
            let entity_type = match &self.nodes[id].kind {
                NodeKind::Entity(entity) => Some(entity.entity_type.clone()),
                NodeKind::Step(_) => {
                    self.steps.push(id);
                    None
                }
                _ => None,
            };
            if let Some(entity_type) = entity_type {
                self.index_entity_type(&entity_type, id);
            }

            self.compile_children(id, dir, ignore)?;
        }

        let folder_names: Vec<String> = child_dirs.iter().map(|d| file_name(d)).collect();
        for file in files_in_folder(parent_dir, ignore, &folder_names)? {
            self.nodes[parent_id].files.push(file);
        }
        Ok(())
    }

    fn add_node(&mut self, parent: Option<NodeId>, dir: &Path, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SchemaNode {
            id,
            parent,
            name: file_name(dir),
            schema_path: dir.to_path_buf(),
            kind,
            children: Vec::new(),
            files: Vec::new(),
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id].children.push(id);
        }
        id
    }

    fn index_entity_type(&mut self, entity_type: &str, id: NodeId) {
        self.by_entity_type
            .entry(entity_type.to_string())
            .or_default()
            .push(id);
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id]
    }

    /// Ids of the project root nodes, in compile order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes bound to a given entity type (project roots included under
    /// "Project").
    pub fn nodes_for_entity_type(&self, entity_type: &str) -> Vec<&SchemaNode> {
        self.by_entity_type
            .get(entity_type)
            .map(|ids| ids.iter().map(|id| &self.nodes[*id]).collect())
            .unwrap_or_default()
    }

    /// All pipeline-step nodes, in compile order.
    pub fn step_nodes(&self) -> Vec<&SchemaNode> {
        self.steps.iter().map(|id| &self.nodes[*id]).collect()
    }
}

/// Read the `ignore_files` pattern list at the schema root, if present.
///
/// One glob pattern per line; `#` starts a comment, blank lines are skipped.
fn read_ignore_files(schema_dir: &Path) -> Result<Vec<Pattern>> {
    let file_path = schema_dir.join(IGNORE_FILES);
    if !file_path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&file_path)?;
    let mut patterns = Vec::new();
    for line in content.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();
        if !line.is_empty() {
            patterns.push(Pattern::new(line)?);
        }
    }
    Ok(patterns)
}

/// Immediate subdirectories of a path, sorted, hidden ones skipped.
fn sub_directories(parent: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && !file_name(&path).starts_with('.') {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Plain files in a folder, excluding node metadata files and ignore-pattern
/// matches, sorted.
fn files_in_folder(
    parent: &Path,
    ignore: &[Pattern],
    folder_names: &[String],
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = file_name(&path);
        if ignore.iter().any(|p| p.matches(&name)) {
            continue;
        }
        if let Some(stem) = name.strip_suffix(&format!(".{}", METADATA_EXT)) {
            // foo.yml next to a folder called foo is that folder's metadata
            if folder_names.iter().any(|f| f == stem) {
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn read_metadata(dir: &Path) -> Result<Option<NodeMetadata>> {
    let yml_file = match dir.parent() {
        Some(parent) => parent.join(format!("{}.{}", file_name(dir), METADATA_EXT)),
        None => return Ok(None),
    };
    if !yml_file.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&yml_file)?;
    let metadata = serde_yaml::from_str(&content).map_err(|e| Error::Schema {
        path: yml_file,
        message: format!("cannot load metadata: {}", e),
    })?;
    Ok(Some(metadata))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small but representative schema: project root, static level,
    /// sequences/shots, per-shot steps and a user sandbox.
    fn build_schema_dir(temp: &TempDir) -> PathBuf {
        let schema = temp.path().join("schema");
        let project = schema.join("project");

        fs::create_dir_all(project.join("editorial")).unwrap();
        write(
            &schema.join("project").join("editorial").join("cut_info.txt"),
            "placeholder",
        );

        fs::create_dir_all(project.join("sequences").join("sequence").join("shot")).unwrap();
        write(&project.join("sequences.yml"), "type: static");
        write(
            &project.join("sequences").join("sequence.yml"),
            "{type: entity, entity_type: Sequence, filters: [{field: project, value: $project}]}",
        );
        write(
            &project
                .join("sequences")
                .join("sequence")
                .join("shot.yml"),
            "{type: entity, entity_type: Shot, filters: [{field: sg_sequence, value: $Sequence}]}",
        );

        let shot = project.join("sequences").join("sequence").join("shot");
        fs::create_dir_all(shot.join("step")).unwrap();
        write(&shot.join("step.yml"), "type: step");
        fs::create_dir_all(shot.join("sandbox").join("user")).unwrap();
        write(&shot.join("sandbox.yml"), "type: static");
        write(
            &shot.join("sandbox").join("user.yml"),
            "type: user_workspace",
        );

        write(&schema.join("ignore_files"), "*.swp # editor leftovers\n");
        schema
    }

    #[test]
    fn test_compile_counts_and_lookups() {
        let temp = TempDir::new().unwrap();
        let schema_dir = build_schema_dir(&temp);
        let schema = FolderSchema::compile(&schema_dir).unwrap();

        // project, editorial, sequences, sequence, shot, step, sandbox, user
        assert_eq!(schema.node_count(), 8);
        assert_eq!(schema.roots().len(), 1);

        let root = schema.node(schema.roots()[0]);
        assert_eq!(root.name, "project");
        assert!(matches!(&root.kind, NodeKind::Project { root_name } if root_name == "primary"));

        let shots = schema.nodes_for_entity_type("Shot");
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].name, "shot");

        assert_eq!(schema.nodes_for_entity_type("Project").len(), 1);
        assert_eq!(schema.step_nodes().len(), 1);
        assert!(schema.nodes_for_entity_type("Asset").is_empty());
    }

    #[test]
    fn test_parent_backrefs_and_files() {
        let temp = TempDir::new().unwrap();
        let schema_dir = build_schema_dir(&temp);
        let schema = FolderSchema::compile(&schema_dir).unwrap();

        let shots = schema.nodes_for_entity_type("Shot");
        let shot = shots[0];
        let sequence = schema.node(shot.parent.unwrap());
        assert_eq!(sequence.name, "sequence");

        // the editorial folder carries one verbatim file
        let root = schema.node(schema.roots()[0]);
        let editorial_id = *root
            .children
            .iter()
            .find(|id| schema.node(**id).name == "editorial")
            .unwrap();
        let editorial = schema.node(editorial_id);
        assert!(matches!(editorial.kind, NodeKind::Static));
        assert_eq!(editorial.files.len(), 1);
        assert!(editorial.files[0].ends_with("cut_info.txt"));
    }

    #[test]
    fn test_ignore_files_patterns_and_comments() {
        let temp = TempDir::new().unwrap();
        let schema_dir = build_schema_dir(&temp);
        // a file matching the ignore pattern next to a real one
        write(
            &schema_dir.join("project").join("editorial").join(".cut_info.txt.swp"),
            "",
        );
        let schema = FolderSchema::compile(&schema_dir).unwrap();

        let root = schema.node(schema.roots()[0]);
        let editorial_id = *root
            .children
            .iter()
            .find(|id| schema.node(**id).name == "editorial")
            .unwrap();
        assert_eq!(schema.node(editorial_id).files.len(), 1);
    }

    #[test]
    fn test_undecorated_root_folder_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        fs::create_dir_all(schema_dir.join("stuff")).unwrap();

        let result = FolderSchema::compile(&schema_dir);
        match result {
            Err(Error::Schema { path, .. }) => assert!(path.ends_with("stuff")),
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_project_root_type_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        fs::create_dir_all(schema_dir.join("assets")).unwrap();
        write(&schema_dir.join("assets.yml"), "type: static");

        let result = FolderSchema::compile(&schema_dir);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_unknown_node_type_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        let project = schema_dir.join("project");
        fs::create_dir_all(project.join("weird")).unwrap();
        write(&project.join("weird.yml"), "type: widget");

        let result = FolderSchema::compile(&schema_dir);
        match result {
            Err(Error::Schema { path, message }) => {
                assert!(path.ends_with("weird.yml"));
                assert!(message.contains("cannot load metadata"));
            }
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_metadata_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        let project = schema_dir.join("project");
        fs::create_dir_all(project.join("broken")).unwrap();
        write(&project.join("broken.yml"), "type: [unclosed");

        let result = FolderSchema::compile(&schema_dir);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_empty_schema_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        fs::create_dir_all(&schema_dir).unwrap();

        let result = FolderSchema::compile(&schema_dir);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_nested_project_type_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let schema_dir = temp.path().join("schema");
        let project = schema_dir.join("project");
        fs::create_dir_all(project.join("inner")).unwrap();
        write(&project.join("inner.yml"), "type: project");

        let result = FolderSchema::compile(&schema_dir);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }
}
