//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for
//! `pathtrack`. It uses the `thiserror` library to create a single `Error`
//! enum covering all anticipated failure modes, with contextual fields so
//! callers can report the offending file, template or path.
//!
//! ## Taxonomy
//!
//! - **`Config`**: malformed or structurally invalid template/roots
//!   definitions. Fatal at load, never retried.
//! - **`Schema`**: a malformed folder schema tree, citing the offending
//!   path. Fatal at compile, never retried.
//! - **`AmbiguousTemplate`**: more than one registered template matches a
//!   path. Surfaced with the full candidate list, never auto-resolved.
//! - **`TemplateMismatch`**: a path does not fit a specific template. Used
//!   internally to reject glob false-positives.
//! - **`Conflict`**: a path cache entry collision. The existing mapping is
//!   preserved and the operation aborted.
//!
//! Wrapped I/O, YAML, glob, regex and SQLite errors sit at the bottom of the
//! enum and convert via `#[from]`.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityRef;

/// Main error type for pathtrack operations
#[derive(Error, Debug)]
pub enum Error {
    /// A template or roots definition is malformed or structurally invalid.
    ///
    /// Includes the specific issue and optionally a hint about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The folder schema on disk is malformed, citing the offending path.
    #[error("Schema error in '{}': {message}", path.display())]
    Schema { path: PathBuf, message: String },

    /// More than one registered template matches a path.
    ///
    /// Carries the sorted names of every matching template. This indicates a
    /// template-configuration design defect and is surfaced to the caller
    /// rather than resolved by picking one.
    #[error("{} templates match the path '{path}': {}", candidates.len(), candidates.join(", "))]
    AmbiguousTemplate {
        path: String,
        candidates: Vec<String>,
    },

    /// A path does not match a specific template's pattern.
    #[error("Path '{path}' does not match template '{template}': {message}")]
    TemplateMismatch {
        template: String,
        path: String,
        message: String,
    },

    /// A template field could not be rendered or parsed.
    ///
    /// May include the name of the problematic key when applicable.
    #[error("Template field error: {message}{}", key.as_ref().map(|k| format!(" (key: {})", k)).unwrap_or_default())]
    Field {
        message: String,
        /// The template key that caused the error, if applicable
        key: Option<String>,
    },

    /// A path is already bound to a different entity in the path cache.
    #[error("Path '{path}' is already associated with {existing}, refusing to map it to {incoming}")]
    Conflict {
        path: String,
        existing: EntityRef,
        incoming: EntityRef,
    },

    /// The path cache store could not be opened or written.
    #[error("Path cache error: {message}")]
    Store { message: String },

    /// The entity-data collaborator returned nothing usable.
    #[error("Entity data error: {message}")]
    EntityData { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A SQLite error, wrapped from `rusqlite::Error`.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let error = Error::Config {
            message: "duplicate template name 'shot_root'".to_string(),
            hint: None,
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("shot_root"));
    }

    #[test]
    fn test_error_display_config_with_hint() {
        let error = Error::Config {
            message: "missing 'primary' root".to_string(),
            hint: Some("add a 'primary' entry to roots.yml".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("roots.yml"));
    }

    #[test]
    fn test_error_display_schema() {
        let error = Error::Schema {
            path: PathBuf::from("/schema/assets"),
            message: "unknown metadata type 'widget'".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("/schema/assets"));
        assert!(display.contains("widget"));
    }

    #[test]
    fn test_error_display_ambiguous_template() {
        let error = Error::AmbiguousTemplate {
            path: "seq01/sh010".to_string(),
            candidates: vec!["shot_alt".to_string(), "shot_root".to_string()],
        };
        let display = format!("{}", error);
        assert!(display.contains("2 templates"));
        assert!(display.contains("shot_alt"));
        assert!(display.contains("shot_root"));
        assert!(display.contains("seq01/sh010"));
    }

    #[test]
    fn test_error_display_conflict() {
        let error = Error::Conflict {
            path: "/proj/seq01/sh010".to_string(),
            existing: EntityRef::new("Shot", 12, "sh010"),
            incoming: EntityRef::new("Shot", 13, "sh011"),
        };
        let display = format!("{}", error);
        assert!(display.contains("/proj/seq01/sh010"));
        assert!(display.contains("already associated"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error =
            serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        let display = format!("{}", error);
        assert!(display.contains("YAML parsing error"));
    }
}
