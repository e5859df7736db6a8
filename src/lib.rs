//! # Pathtrack Library
//!
//! This library maps between logical production-tracking entities
//! (projects, shots, assets, tasks, users) and physical file-system
//! locations, and back. It is the core of a pipeline's folder management:
//! the surrounding tooling (command-line dispatch, the connection to the
//! tracking service) layers on top of it.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::path::Path;
//! use pathtrack::Pipeline;
//!
//! let pipeline = Pipeline::open(Path::new("/mnt/projects/alpha")).unwrap();
//!
//! // which template does this path belong to, and which fields does it carry?
//! let path = Path::new("/mnt/projects/alpha/sequences/seq01/sh010/comp");
//! if let Some(template) = pipeline.template_from_path(path).unwrap() {
//!     let fields = template.fields_from_path(path).unwrap();
//!     println!("{} -> {:?}", template.name(), fields);
//! }
//!
//! // which paths belong to Shot 42?
//! let paths = pipeline.paths_from_entity("Shot", 42).unwrap();
//! println!("{:?}", paths);
//! ```
//!
//! ## Core Concepts
//!
//! The library is built around a few key pieces:
//!
//! - **Templates (`template`)**: named, parametrized path patterns with
//!   typed keys. Rendering turns field values into a concrete path;
//!   matching recovers the field values from a path and detects ambiguity.
//! - **Folder Schema (`schema`)**: a directory-of-YAML description of a
//!   project's folder hierarchy, compiled into a tree of typed nodes.
//! - **Materializer (`folders`)**: walks the schema tree for an entity,
//!   creates the directories that do not exist yet and records what it
//!   created.
//! - **Path Cache (`path_cache`)**: the persistent SQLite index of
//!   path↔entity associations, shared by every process working on the
//!   project.
//! - **Pipeline (`api`)**: the per-project façade tying the pieces
//!   together.
//!
//! ## Execution Flow
//!
//! An entity change (or an explicit request) flows through the materializer:
//! it consults the schema tree and the entity-data collaborator, creates
//! missing directories and writes path cache entries. Independently, a path
//! resolves to a template and its fields, or a template plus fields resolves
//! to concrete paths validated against the filesystem.

pub mod api;
pub mod defaults;
pub mod entity;
pub mod error;
pub mod folders;
pub mod path_cache;
pub mod roots;
pub mod schema;
pub mod template;

pub use api::Pipeline;
pub use entity::{EntityRecord, EntityRef, EntitySource, Filter, FilterValue};
pub use error::{Error, Result};
pub use folders::{MaterializeReport, Materializer, PendingOp};
pub use path_cache::PathCache;
pub use roots::StorageRoots;
pub use schema::FolderSchema;
pub use template::{FieldSet, FieldValue, MissingPolicy, Template, TemplateRegistry};

#[cfg(test)]
mod template_proptest;
