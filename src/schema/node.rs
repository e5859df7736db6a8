//! Typed schema nodes and their on-disk metadata.
//!
//! Every folder in the schema directory compiles to one [`SchemaNode`]. The
//! node kind is a tagged enum with per-kind metadata, so the materializer's
//! dispatch is an exhaustive match and adding a kind is a compile-checked
//! change.

use std::path::PathBuf;

use serde::Deserialize;

use crate::defaults::PRIMARY_ROOT_NAME;

/// Index of a node in the compiled schema's arena.
pub type NodeId = usize;

/// One typed element of the compiled folder-structure description.
#[derive(Debug)]
pub struct SchemaNode {
    pub id: NodeId,
    /// Back-reference to the owning node; `None` for project roots
    pub parent: Option<NodeId>,
    /// Folder basename in the schema directory
    pub name: String,
    /// Location of the node inside the schema directory, for error messages
    pub schema_path: PathBuf,
    pub kind: NodeKind,
    /// Ordered child nodes
    pub children: Vec<NodeId>,
    /// Plain files inside the schema folder, created verbatim on
    /// materialization
    pub files: Vec<PathBuf>,
}

/// The kind of a schema node, with per-kind configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A project root, anchored at a named storage root
    Project { root_name: String },
    /// A folder created as-is
    Static,
    /// One folder per matching entity, named after an entity field
    Entity(EntityFolder),
    /// One folder per distinct value of an entity field
    ListField { entity_type: String, field: String },
    /// One folder named after the current process user
    UserWorkspace,
    /// One folder per pipeline step
    Step(StepFolder),
    /// One folder per pipeline task
    Task(TaskFolder),
}

/// Configuration of an entity-bound folder.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFolder {
    pub entity_type: String,
    /// Entity field whose value names the folder
    pub name_field: String,
    pub filters: Vec<FilterDef>,
}

/// Configuration of a pipeline-step folder.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFolder {
    pub name_field: String,
    pub filters: Vec<FilterDef>,
}

/// Configuration of a pipeline-task folder.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFolder {
    pub name_field: String,
    pub filters: Vec<FilterDef>,
}

/// One equality condition in node metadata.
///
/// A string value beginning with `$` is a context token resolved during
/// materialization against entities bound higher in the walk: `$project`
/// refers to the current project, `$Shot` to the bound Shot, and so on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterDef {
    pub field: String,
    pub value: serde_yaml::Value,
}

/// Raw node metadata as written in a folder's sibling `.yml` file.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum NodeMetadata {
    Project {
        #[serde(default = "default_root_name")]
        root_name: String,
    },
    Static {},
    Entity {
        entity_type: String,
        #[serde(default = "default_entity_name_field")]
        name_field: String,
        #[serde(default)]
        filters: Vec<FilterDef>,
    },
    ListField {
        entity_type: String,
        field: String,
    },
    UserWorkspace {},
    Step {
        #[serde(default = "default_step_name_field")]
        name_field: String,
        #[serde(default)]
        filters: Vec<FilterDef>,
    },
    Task {
        #[serde(default = "default_task_name_field")]
        name_field: String,
        #[serde(default)]
        filters: Vec<FilterDef>,
    },
}

impl NodeMetadata {
    pub(crate) fn into_kind(self) -> NodeKind {
        match self {
            NodeMetadata::Project { root_name } => NodeKind::Project { root_name },
            NodeMetadata::Static {} => NodeKind::Static,
            NodeMetadata::Entity {
                entity_type,
                name_field,
                filters,
            } => NodeKind::Entity(EntityFolder {
                entity_type,
                name_field,
                filters,
            }),
            NodeMetadata::ListField { entity_type, field } => {
                NodeKind::ListField { entity_type, field }
            }
            NodeMetadata::UserWorkspace {} => NodeKind::UserWorkspace,
            NodeMetadata::Step { name_field, filters } => {
                NodeKind::Step(StepFolder { name_field, filters })
            }
            NodeMetadata::Task { name_field, filters } => {
                NodeKind::Task(TaskFolder { name_field, filters })
            }
        }
    }
}

pub(crate) fn default_root_name() -> String {
    PRIMARY_ROOT_NAME.to_string()
}

fn default_entity_name_field() -> String {
    "code".to_string()
}

fn default_step_name_field() -> String {
    "short_name".to_string()
}

fn default_task_name_field() -> String {
    "content".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_metadata_defaults() {
        let meta: NodeMetadata =
            serde_yaml::from_str("{type: entity, entity_type: Shot}").unwrap();
        match meta.into_kind() {
            NodeKind::Entity(entity) => {
                assert_eq!(entity.entity_type, "Shot");
                assert_eq!(entity.name_field, "code");
                assert!(entity.filters.is_empty());
            }
            other => panic!("expected entity kind, got {:?}", other),
        }
    }

    #[test]
    fn test_entity_metadata_with_filters() {
        let meta: NodeMetadata = serde_yaml::from_str(
            r#"
type: entity
entity_type: Asset
name_field: code
filters:
  - {field: project, value: $project}
  - {field: sg_asset_type, value: prop}
"#,
        )
        .unwrap();
        match meta.into_kind() {
            NodeKind::Entity(entity) => {
                assert_eq!(entity.filters.len(), 2);
                assert_eq!(entity.filters[0].field, "project");
            }
            other => panic!("expected entity kind, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_yaml::from_str::<NodeMetadata>("type: widget");
        assert!(result.is_err());
    }

    #[test]
    fn test_step_and_task_name_field_defaults() {
        let step: NodeMetadata = serde_yaml::from_str("type: step").unwrap();
        match step.into_kind() {
            NodeKind::Step(step) => assert_eq!(step.name_field, "short_name"),
            other => panic!("expected step kind, got {:?}", other),
        }
        let task: NodeMetadata = serde_yaml::from_str("type: task").unwrap();
        match task.into_kind() {
            NodeKind::Task(task) => assert_eq!(task.name_field, "content"),
            other => panic!("expected task kind, got {:?}", other),
        }
    }
}
