//! # Template Registry
//!
//! Loads named template definitions from `templates.yml` and answers the
//! "which template does this path belong to" question.
//!
//! The file has two sections: `keys` defines every typed key once, `paths`
//! maps template names to patterns. A path entry is either a bare pattern
//! string (anchored under the primary root) or a mapping with `definition`
//! and an optional `root_name`:
//!
//! ```yaml
//! keys:
//!   Sequence: {type: str}
//!   Shot:     {type: str}
//! paths:
//!   shot_root: sequences/{Sequence}/{Shot}
//!   shot_render:
//!     definition: sequences/{Sequence}/{Shot}/render
//!     root_name: render
//! ```
//!
//! Load-time validation rejects duplicate template names and keys referenced
//! but not defined. Templates that share an identical literal skeleton (the
//! pattern with every placeholder wildcarded) are reported as a `warn!`
//! diagnostic at load time; they still register, and resolving a path they
//! both match fails with `AmbiguousTemplate` at match time. The runtime
//! check is the correctness backstop; the static one only surfaces the
//! defect earlier.

use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::defaults::PRIMARY_ROOT_NAME;
use crate::error::{Error, Result};
use crate::roots::StorageRoots;

use super::key::{KeyDef, TemplateKey};
use super::Template;

/// Raw shape of `templates.yml`.
#[derive(Debug, Deserialize)]
struct TemplatesFile {
    #[serde(default)]
    keys: BTreeMap<String, KeyDef>,
    #[serde(default)]
    paths: BTreeMap<String, PathEntry>,
}

/// One entry in the `paths` section: a bare pattern or a full mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathEntry {
    Pattern(String),
    Full {
        definition: String,
        #[serde(default)]
        root_name: Option<String>,
    },
}

/// The named template collection for a project, read-only after load.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    /// Parse a `templates.yml` document and compile every template.
    pub fn from_yaml(content: &str, roots: &StorageRoots) -> Result<Self> {
        let file: TemplatesFile = serde_yaml::from_str(content)?;

        let mut key_table = BTreeMap::new();
        for (name, def) in &file.keys {
            key_table.insert(name.clone(), TemplateKey::from_def(name, def)?);
        }

        let mut registry = Self::default();
        for (name, entry) in &file.paths {
            let (definition, root_name) = match entry {
                PathEntry::Pattern(definition) => (definition.as_str(), PRIMARY_ROOT_NAME),
                PathEntry::Full {
                    definition,
                    root_name,
                } => (
                    definition.as_str(),
                    root_name.as_deref().unwrap_or(PRIMARY_ROOT_NAME),
                ),
            };
            let root_path = roots.get(root_name)?;
            let template = Template::new(name, definition, root_name, root_path, &key_table)?;
            registry.register(template)?;
        }

        registry.warn_on_skeleton_collisions();
        Ok(registry)
    }

    /// Load and parse a template definition file.
    pub fn from_file(path: &Path, roots: &StorageRoots) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read '{}': {}", path.display(), e),
            hint: None,
        })?;
        Self::from_yaml(&content, roots)
    }

    /// Add a compiled template, failing with a `Config` error on a
    /// duplicate name.
    pub fn register(&mut self, template: Template) -> Result<()> {
        let name = template.name().to_string();
        if self.templates.contains_key(&name) {
            return Err(Error::Config {
                message: format!("duplicate template name '{}'", name),
                hint: None,
            });
        }
        self.templates.insert(name, template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate over templates in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Find the template matching a concrete path.
    ///
    /// Zero matches is `Ok(None)`; more than one is `AmbiguousTemplate`
    /// carrying every candidate name, since overlapping templates indicate a
    /// configuration design defect the caller has to see.
    pub fn template_from_path(&self, path: &Path) -> Result<Option<&Template>> {
        let matched: Vec<&Template> = self
            .templates
            .values()
            .filter(|t| t.validate(path))
            .collect();

        match matched.len() {
            0 => Ok(None),
            1 => Ok(Some(matched[0])),
            _ => Err(Error::AmbiguousTemplate {
                path: path.display().to_string(),
                candidates: matched.iter().map(|t| t.name().to_string()).collect(),
            }),
        }
    }

    fn warn_on_skeleton_collisions(&self) {
        let mut by_skeleton: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for template in self.templates.values() {
            by_skeleton
                .entry(template.wildcard_skeleton())
                .or_default()
                .push(template.name());
        }
        for (skeleton, names) in by_skeleton {
            if names.len() > 1 {
                warn!(
                    "templates {} share the literal structure '{}'; paths matching it will fail as ambiguous",
                    names.join(", "),
                    skeleton
                );
            }
        }
    }
}
