//! Typed template keys.
//!
//! A key names one variable piece of a path pattern. Keys are typed (text,
//! integer, choice list), may carry a default, may translate shorthand value
//! aliases, and may be *abstract*: placeholders such as a frame-number token
//! that never correspond to a real directory level on disk. An abstract
//! key's default holds its formatting placeholder (e.g. `%04d`).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};

use super::FieldValue;

/// Raw key definition as it appears in `templates.yml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDef {
    #[serde(rename = "type", default)]
    pub kind: KeyTypeName,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Zero-padding width for integer keys, e.g. "03"
    #[serde(default)]
    pub format_spec: Option<String>,
    /// Allowed values for choice keys
    #[serde(default)]
    pub choices: Vec<String>,
}

/// The `type` field of a key definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyTypeName {
    #[default]
    Str,
    Int,
    Choice,
}

/// The resolved type of a [`TemplateKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum KeyKind {
    /// Any text not containing a path separator
    Text,
    /// A non-negative integer, optionally zero-padded to a fixed width
    Integer { pad: Option<usize> },
    /// One value out of a fixed list
    Choice { choices: Vec<String> },
}

/// A named, typed key used by one or more templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateKey {
    name: String,
    kind: KeyKind,
    default: Option<String>,
    is_abstract: bool,
    aliases: BTreeMap<String, String>,
}

impl TemplateKey {
    /// Build a key from its raw definition, validating type-specific fields.
    pub fn from_def(name: &str, def: &KeyDef) -> Result<Self> {
        let kind = match def.kind {
            KeyTypeName::Str => {
                if !def.choices.is_empty() {
                    return Err(Error::Config {
                        message: format!("key '{}' of type 'str' does not take choices", name),
                        hint: Some("use 'type: choice' for enumerated keys".to_string()),
                    });
                }
                KeyKind::Text
            }
            KeyTypeName::Int => {
                let pad = match def.format_spec.as_deref() {
                    None => None,
                    Some(spec) => Some(spec.parse::<usize>().map_err(|_| Error::Config {
                        message: format!(
                            "key '{}' has invalid format_spec '{}', expected a padding width such as \"03\"",
                            name, spec
                        ),
                        hint: None,
                    })?),
                };
                KeyKind::Integer { pad }
            }
            KeyTypeName::Choice => {
                if def.choices.is_empty() {
                    return Err(Error::Config {
                        message: format!("key '{}' of type 'choice' defines no choices", name),
                        hint: None,
                    });
                }
                KeyKind::Choice {
                    choices: def.choices.clone(),
                }
            }
        };

        if def.is_abstract && def.default.is_none() {
            return Err(Error::Config {
                message: format!(
                    "abstract key '{}' needs a default to act as its placeholder",
                    name
                ),
                hint: Some("set e.g. 'default: \"%04d\"'".to_string()),
            });
        }

        Ok(Self {
            name: name.to_string(),
            kind,
            default: def.default.clone(),
            is_abstract: def.is_abstract,
            aliases: def.aliases.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &KeyKind {
        &self.kind
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// The default value string, verbatim as configured.
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// The regex fragment matching one value of this key.
    ///
    /// Text is non-greedy so keys sharing a segment with literal separators
    /// split deterministically at the first separator occurrence.
    pub fn regex_fragment(&self) -> String {
        match &self.kind {
            KeyKind::Text => "[^/]+?".to_string(),
            KeyKind::Integer { pad: None } => r"\d+".to_string(),
            KeyKind::Integer { pad: Some(width) } => format!(r"\d{{{},}}", width),
            KeyKind::Choice { choices } => {
                let alternatives: Vec<String> =
                    choices.iter().map(|c| regex::escape(c)).collect();
                format!("(?:{})", alternatives.join("|"))
            }
        }
    }

    /// Parse a path segment fragment into a typed field value.
    ///
    /// Padded integers reject superfluous leading zeros so that formatting
    /// the parsed value reproduces the input exactly.
    pub fn parse(&self, text: &str) -> Result<FieldValue> {
        match &self.kind {
            KeyKind::Text => Ok(FieldValue::Text(text.to_string())),
            KeyKind::Integer { pad } => {
                let value: i64 = text.parse().map_err(|_| self.value_error(text))?;
                let min_len = pad.unwrap_or(1);
                if text.len() > min_len && text.starts_with('0') {
                    return Err(self.value_error(text));
                }
                if text.len() < min_len {
                    return Err(self.value_error(text));
                }
                Ok(FieldValue::Number(value))
            }
            KeyKind::Choice { choices } => {
                if choices.iter().any(|c| c == text) {
                    Ok(FieldValue::Text(text.to_string()))
                } else {
                    Err(self.value_error(text))
                }
            }
        }
    }

    /// Format a field value for substitution into a path.
    ///
    /// Shorthand aliases are translated to their canonical value first;
    /// integer keys also accept numeric text.
    pub fn format(&self, value: &FieldValue) -> Result<String> {
        match (&self.kind, value) {
            (KeyKind::Text, FieldValue::Text(s)) => Ok(self.resolve_alias(s)),
            (KeyKind::Text, FieldValue::Number(n)) => Ok(n.to_string()),
            (KeyKind::Integer { pad }, value) => {
                let number = match value {
                    FieldValue::Number(n) => *n,
                    FieldValue::Text(s) => s.parse().map_err(|_| self.value_error(s))?,
                };
                match pad {
                    Some(width) => Ok(format!("{:0width$}", number, width = *width)),
                    None => Ok(number.to_string()),
                }
            }
            (KeyKind::Choice { choices }, FieldValue::Text(s)) => {
                let canonical = self.resolve_alias(s);
                if choices.iter().any(|c| *c == canonical) {
                    Ok(canonical)
                } else {
                    Err(self.value_error(s))
                }
            }
            (KeyKind::Choice { .. }, FieldValue::Number(n)) => {
                Err(self.value_error(&n.to_string()))
            }
        }
    }

    fn resolve_alias(&self, value: &str) -> String {
        self.aliases
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    fn value_error(&self, text: &str) -> Error {
        Error::Field {
            message: format!("'{}' is not a valid value", text),
            key: Some(self.name.clone()),
        }
    }
}
