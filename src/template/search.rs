//! Filesystem searches built on template rendering.
//!
//! Searching is glob-then-revalidate: render the pattern with wildcards for
//! unbound keys, glob the filesystem, then validate every hit against the
//! template again. The re-validation is mandatory, not an optimization:
//! glob wildcards do not respect key type constraints, so a numeric key
//! would happily "match" a segment containing letters without it.
//!
//! Keeping the search separate from rendering means abstract and partial
//! paths can be computed without every intermediate directory physically
//! existing, which matters because production filesystems are sparsely
//! populated at query time.

use std::collections::BTreeSet;
use std::path::PathBuf;

use log::warn;

use super::{FieldSet, MissingPolicy, Template};
use crate::error::Result;

/// Find on-disk paths matching a template under partially bound fields.
///
/// Keys in `skip_keys`, and keys missing from `fields` without a default,
/// are searched as `*` wildcards. Keys with defaults render their default.
/// Results are validated against the template and returned sorted.
pub fn paths_from_template(
    template: &Template,
    fields: &FieldSet,
    skip_keys: &[&str],
) -> Result<Vec<PathBuf>> {
    let mut skip: BTreeSet<String> = skip_keys.iter().map(|k| k.to_string()).collect();
    for missing in template.missing_keys(fields) {
        skip.insert(missing.to_string());
    }

    let rel = template.render(fields, &skip, MissingPolicy::Default)?;
    let glob_str = template.join_rel(&rel).to_string_lossy().into_owned();

    let mut found = Vec::new();
    for entry in glob::glob(&glob_str)? {
        match entry {
            Ok(path) => {
                if template.validate(&path) {
                    found.push(path);
                }
            }
            Err(e) => {
                warn!("skipping unreadable glob hit for '{}': {}", glob_str, e);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Find abstract paths for a template, e.g. frame-sequence expressions.
///
/// Abstract keys are stripped from the search entirely (matched as
/// wildcards) and reintroduced into each hit, using the caller-supplied
/// value when given and the key's placeholder default otherwise. When every
/// key unique to the leaf segment is abstract, the search runs against the
/// parent template instead, so the leaf directory itself is not required to
/// exist on disk. Results collapse to unique abstract paths, sorted.
pub fn abstract_paths_from_template(
    template: &Template,
    fields: &FieldSet,
) -> Result<Vec<PathBuf>> {
    let abstract_keys = template.abstract_key_names();

    let mut search_fields = fields.clone();
    for key in &abstract_keys {
        search_fields.remove(*key);
    }

    let parent = template.parent();
    let search_template = match &parent {
        Some(parent_template) => {
            let parent_keys: BTreeSet<&str> = parent_template.key_names().into_iter().collect();
            let leaf_only_abstract = template
                .key_names()
                .into_iter()
                .filter(|k| !parent_keys.contains(k))
                .all(|k| abstract_keys.contains(k));
            if leaf_only_abstract {
                parent_template
            } else {
                template
            }
        }
        None => template,
    };

    // abstract keys are searched as wildcards, never as their placeholder
    let search_skip: Vec<&str> = abstract_keys
        .iter()
        .copied()
        .filter(|k| search_template.has_key(k))
        .collect();
    let found = paths_from_template(search_template, &search_fields, &search_skip)?;

    let mut results = BTreeSet::new();
    for path in found {
        let mut cur_fields = search_template.fields_from_path(&path)?;
        for key in &abstract_keys {
            match fields.get(*key) {
                // abstract keys may have formatting values supplied
                Some(value) => {
                    cur_fields.insert((*key).to_string(), value.clone());
                }
                None => {
                    cur_fields.remove(*key);
                }
            }
        }
        results.insert(template.apply_fields(&cur_fields)?);
    }
    Ok(results.into_iter().collect())
}
