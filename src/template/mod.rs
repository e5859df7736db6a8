//! # Path Templates
//!
//! A template is a named, parametrized path pattern with typed keys:
//!
//! ```text
//! shot_work: sequences/{Sequence}/{Shot}/work
//! ```
//!
//! Rendering substitutes concrete field values for the `{Key}` placeholders;
//! matching runs the other direction and recovers the field values from a
//! concrete path. Both directions are pure string work against a storage
//! root, with no filesystem access. Filesystem searches built on top of the
//! rendering primitives live in [`search`].
//!
//! ## Key Components
//!
//! - **`Template`**: one compiled pattern, anchored under a storage root,
//!   with its ordered key list and a derived matcher regex.
//! - **`TemplateKey`** (in [`key`]): a typed placeholder (text, integer,
//!   choice), optionally abstract.
//! - **`FieldSet`**: a possibly partial mapping of key name to value.
//! - **`TemplateRegistry`** (in [`registry`]): the named collection loaded
//!   from `templates.yml`, with ambiguity detection.
//!
//! ## Invariants
//!
//! A template's key set must be derivable unambiguously from any path it
//! matches: two placeholders with no literal text between them are rejected
//! at construction, and a key appearing in more than one path segment is
//! reported as a configuration diagnostic (both occurrences must agree when
//! extracting fields).

pub mod key;
pub mod registry;
pub mod search;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;
use regex::Regex;

use crate::error::{Error, Result};

pub use key::{KeyDef, KeyKind, TemplateKey};
pub use registry::TemplateRegistry;

/// One concrete value bound to a template key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value)
    }
}

/// A possibly partial mapping of key name to concrete value.
pub type FieldSet = BTreeMap<String, FieldValue>;

/// How [`Template::apply_fields_with`] resolves keys absent from the
/// supplied fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Fail on the first unbound key
    Error,
    /// Substitute a `*` wildcard, producing a glob pattern
    Wildcard,
    /// Fall back to the key's default (abstract keys use their placeholder),
    /// failing when there is none
    Default,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    /// Index into the template's ordered key list
    Key(usize),
}

/// A named, parametrized path pattern anchored under a storage root.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    definition: String,
    root_name: String,
    root_path: PathBuf,
    tokens: Vec<Token>,
    keys: Vec<TemplateKey>,
    /// Key index for each capture group, in pattern order
    capture_keys: Vec<usize>,
    matcher: Regex,
}

impl Template {
    /// Compile a pattern against a key table.
    ///
    /// Fails with a `Config` error on malformed patterns (unterminated or
    /// empty placeholder, stray `}`, leading/trailing/doubled separators,
    /// adjacent placeholders) and on keys not present in the table.
    pub fn new(
        name: &str,
        definition: &str,
        root_name: &str,
        root_path: &Path,
        key_table: &BTreeMap<String, TemplateKey>,
    ) -> Result<Self> {
        if definition.is_empty() {
            return Err(config_error(name, "empty pattern"));
        }
        if definition.starts_with('/') || definition.ends_with('/') || definition.contains("//") {
            return Err(config_error(
                name,
                "pattern segments must be separated by single '/' with no leading or trailing separator",
            ));
        }

        let (tokens, keys) = tokenize(name, definition, key_table)?;

        let mut pattern = String::from("^");
        let mut capture_keys = Vec::new();
        for token in &tokens {
            match token {
                Token::Literal(text) => pattern.push_str(&regex::escape(text)),
                Token::Key(idx) => {
                    pattern.push('(');
                    pattern.push_str(&keys[*idx].regex_fragment());
                    pattern.push(')');
                    capture_keys.push(*idx);
                }
            }
        }
        pattern.push('$');
        let matcher = Regex::new(&pattern)?;

        Ok(Self {
            name: name.to_string(),
            definition: definition.to_string(),
            root_name: root_name.to_string(),
            root_path: root_path.to_path_buf(),
            tokens,
            keys,
            capture_keys,
            matcher,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// The template's keys, ordered by first appearance in the pattern.
    pub fn keys(&self) -> &[TemplateKey] {
        &self.keys
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.keys.iter().map(TemplateKey::name).collect()
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k.name() == name)
    }

    /// Names of the template's abstract keys.
    pub fn abstract_key_names(&self) -> BTreeSet<&str> {
        self.keys
            .iter()
            .filter(|k| k.is_abstract())
            .map(TemplateKey::name)
            .collect()
    }

    /// Keys not bound by `fields` that have no default to fall back on.
    pub fn missing_keys(&self, fields: &FieldSet) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| !fields.contains_key(k.name()) && k.default().is_none())
            .map(TemplateKey::name)
            .collect()
    }

    /// The template for the pattern with its last path segment removed.
    ///
    /// `None` for single-segment patterns.
    pub fn parent(&self) -> Option<Template> {
        let (parent_def, _) = self.definition.rsplit_once('/')?;
        let key_table: BTreeMap<String, TemplateKey> = self
            .keys
            .iter()
            .map(|k| (k.name().to_string(), k.clone()))
            .collect();
        // the truncated pattern only uses keys the full pattern already
        // validated, so compilation cannot fail structurally
        Template::new(
            &self.name,
            parent_def,
            &self.root_name,
            &self.root_path,
            &key_table,
        )
        .ok()
    }

    /// True iff `path` is anchored under this template's root and matches
    /// the full pattern structure, including per-key type constraints.
    pub fn validate(&self, path: &Path) -> bool {
        match self.relative_to_root(path) {
            Some(rel) => self.fields_from_rel(&rel).is_ok(),
            None => false,
        }
    }

    /// Recover the field values from a concrete path.
    ///
    /// The inverse of [`Template::apply_fields`]; fails with
    /// `TemplateMismatch` when the path does not fit, including when a key
    /// appearing twice in the pattern carries disagreeing values.
    pub fn fields_from_path(&self, path: &Path) -> Result<FieldSet> {
        let rel = self.relative_to_root(path).ok_or_else(|| self.mismatch(
            path.display().to_string(),
            format!("not under root '{}'", self.root_path.display()),
        ))?;
        self.fields_from_rel(&rel)
    }

    /// Render a concrete path, resolving unbound keys through their default.
    pub fn apply_fields(&self, fields: &FieldSet) -> Result<PathBuf> {
        self.apply_fields_with(fields, MissingPolicy::Default)
    }

    /// Render a path, resolving unbound keys per `missing`.
    ///
    /// With [`MissingPolicy::Wildcard`] the result is a glob pattern rather
    /// than a single concrete path.
    pub fn apply_fields_with(&self, fields: &FieldSet, missing: MissingPolicy) -> Result<PathBuf> {
        let rel = self.render(fields, &BTreeSet::new(), missing)?;
        Ok(self.join_rel(&rel))
    }

    /// Render the root-relative pattern, substituting `*` for every key in
    /// `skip` regardless of bound values or defaults.
    pub(crate) fn render(
        &self,
        fields: &FieldSet,
        skip: &BTreeSet<String>,
        missing: MissingPolicy,
    ) -> Result<String> {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Key(idx) => {
                    let key = &self.keys[*idx];
                    if skip.contains(key.name()) {
                        out.push('*');
                    } else if let Some(value) = fields.get(key.name()) {
                        out.push_str(&key.format(value)?);
                    } else {
                        match missing {
                            MissingPolicy::Error => {
                                return Err(Error::Field {
                                    message: "no value supplied".to_string(),
                                    key: Some(key.name().to_string()),
                                })
                            }
                            MissingPolicy::Wildcard => out.push('*'),
                            MissingPolicy::Default => match key.default() {
                                Some(default) => out.push_str(default),
                                None => {
                                    return Err(Error::Field {
                                        message: "no value supplied and no default".to_string(),
                                        key: Some(key.name().to_string()),
                                    })
                                }
                            },
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn join_rel(&self, rel: &str) -> PathBuf {
        let mut path = self.root_path.to_path_buf();
        for part in rel.split('/') {
            path.push(part);
        }
        path
    }

    fn relative_to_root(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root_path).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    fn fields_from_rel(&self, rel: &str) -> Result<FieldSet> {
        let captures = self
            .matcher
            .captures(rel)
            .ok_or_else(|| self.mismatch(rel.to_string(), "pattern does not match".to_string()))?;

        let mut fields = FieldSet::new();
        for (i, key_idx) in self.capture_keys.iter().enumerate() {
            let key = &self.keys[*key_idx];
            let text = captures
                .get(i + 1)
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = key.parse(text).map_err(|e| {
                self.mismatch(rel.to_string(), e.to_string())
            })?;
            if let Some(previous) = fields.get(key.name()) {
                if *previous != value {
                    return Err(self.mismatch(
                        rel.to_string(),
                        format!(
                            "key '{}' appears twice with disagreeing values '{}' and '{}'",
                            key.name(),
                            previous,
                            value
                        ),
                    ));
                }
            } else {
                fields.insert(key.name().to_string(), value);
            }
        }
        Ok(fields)
    }

    fn mismatch(&self, path: String, message: String) -> Error {
        Error::TemplateMismatch {
            template: self.name.clone(),
            path,
            message,
        }
    }

    /// The pattern with every placeholder replaced by `*`, used for static
    /// overlap detection between registered templates.
    pub(crate) fn wildcard_skeleton(&self) -> String {
        let mut out = format!("{}:", self.root_name);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Key(_) => out.push('*'),
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.definition)
    }
}

fn config_error(template: &str, message: &str) -> Error {
    Error::Config {
        message: format!("template '{}': {}", template, message),
        hint: None,
    }
}

fn tokenize(
    name: &str,
    definition: &str,
    key_table: &BTreeMap<String, TemplateKey>,
) -> Result<(Vec<Token>, Vec<TemplateKey>)> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut keys: Vec<TemplateKey> = Vec::new();
    let mut key_first_segment: BTreeMap<String, usize> = BTreeMap::new();
    let mut literal = String::new();
    let mut segment = 0usize;

    let mut rest = definition;
    while !rest.is_empty() {
        if let Some(after_brace) = rest.strip_prefix('{') {
            let end = after_brace.find('}').ok_or_else(|| {
                config_error(name, "unterminated '{' in pattern")
            })?;
            let key_name = &after_brace[..end];
            if key_name.is_empty() {
                return Err(config_error(name, "empty placeholder '{}' in pattern"));
            }

            if !literal.is_empty() {
                segment += literal.matches('/').count();
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            } else if matches!(tokens.last(), Some(Token::Key(_))) {
                return Err(config_error(
                    name,
                    &format!(
                        "placeholder '{{{}}}' directly follows another placeholder; keys must be separated by literal text",
                        key_name
                    ),
                ));
            }

            let key = key_table.get(key_name).ok_or_else(|| Error::Config {
                message: format!(
                    "template '{}' references undefined key '{}'",
                    name, key_name
                ),
                hint: Some("define it in the 'keys' section of templates.yml".to_string()),
            })?;

            match key_first_segment.get(key_name) {
                None => {
                    key_first_segment.insert(key_name.to_string(), segment);
                }
                Some(first) if *first != segment => {
                    warn!(
                        "template '{}': key '{}' appears in more than one path segment; both occurrences must agree when extracting fields",
                        name, key_name
                    );
                }
                Some(_) => {}
            }

            let idx = match keys.iter().position(|k| k.name() == key_name) {
                Some(idx) => idx,
                None => {
                    keys.push(key.clone());
                    keys.len() - 1
                }
            };
            tokens.push(Token::Key(idx));
            rest = &after_brace[end + 1..];
        } else if rest.starts_with('}') {
            return Err(config_error(name, "stray '}' in pattern"));
        } else {
            let next = rest
                .find(['{', '}'])
                .unwrap_or(rest.len());
            literal.push_str(&rest[..next]);
            rest = &rest[next..];
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok((tokens, keys))
}
