//! Entity identities and the entity-data collaborator surface.
//!
//! The core never talks to the production-tracking service directly. It asks
//! an [`EntitySource`] for records and works with the identity triple
//! ([`EntityRef`]) everywhere else: in the path cache, in materializer
//! reports and in error messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// The identity triple of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type name, e.g. "Shot" or "Asset"
    pub entity_type: String,
    /// Numeric id of the entity in the tracking service
    pub id: i64,
    /// Display name of the entity
    pub name: String,
}

impl EntityRef {
    pub fn new(entity_type: &str, id: i64, name: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ('{}')", self.entity_type, self.id, self.name)
    }
}

/// A record returned by the entity-data service.
///
/// `fields` holds whatever fields were requested, in the JSON shape the
/// service uses: scalars for plain fields and `{"type": ..., "id": ...}`
/// objects for entity links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub id: i64,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

impl EntityRecord {
    pub fn new(entity_type: &str, id: i64) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id,
            fields: serde_json::Map::new(),
        }
    }

    /// Builder-style field assignment, mostly for tests and fakes.
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Returns a field as a string slice, if present and textual.
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Returns an entity-link field as `(entity_type, id)`, if present.
    pub fn link_field(&self, name: &str) -> Option<(String, i64)> {
        let link = self.fields.get(name)?;
        let entity_type = link.get("type")?.as_str()?;
        let id = link.get("id")?.as_i64()?;
        Some((entity_type.to_string(), id))
    }
}

/// A single equality condition on an entity query.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: FilterValue,
}

impl Filter {
    pub fn text(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: FilterValue::Text(value.to_string()),
        }
    }

    pub fn number(field: &str, value: i64) -> Self {
        Self {
            field: field.to_string(),
            value: FilterValue::Number(value),
        }
    }

    pub fn link(field: &str, entity_type: &str, id: i64) -> Self {
        Self {
            field: field.to_string(),
            value: FilterValue::Link {
                entity_type: entity_type.to_string(),
                id,
            },
        }
    }
}

/// The value side of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(i64),
    Link { entity_type: String, id: i64 },
}

impl FilterValue {
    /// True when a record field satisfies this filter value.
    pub fn matches(&self, field: &Value) -> bool {
        match self {
            FilterValue::Text(expected) => field.as_str() == Some(expected.as_str()),
            FilterValue::Number(expected) => field.as_i64() == Some(*expected),
            FilterValue::Link { entity_type, id } => {
                field.get("type").and_then(Value::as_str) == Some(entity_type.as_str())
                    && field.get("id").and_then(Value::as_i64) == Some(*id)
            }
        }
    }
}

/// The entity-data collaborator consumed during materialization.
///
/// Implementations query the production-tracking service. `fetch_entities`
/// returns an empty vector, never an error, when nothing matches.
pub trait EntitySource {
    fn fetch_entities(
        &self,
        entity_type: &str,
        filters: &[Filter],
        fields: &[&str],
    ) -> Result<Vec<EntityRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ref_display() {
        let entity = EntityRef::new("Shot", 42, "sh010");
        assert_eq!(format!("{}", entity), "Shot 42 ('sh010')");
    }

    #[test]
    fn test_record_string_field() {
        let record = EntityRecord::new("Shot", 42).with_field("code", json!("sh010"));
        assert_eq!(record.string_field("code"), Some("sh010"));
        assert_eq!(record.string_field("missing"), None);
    }

    #[test]
    fn test_record_link_field() {
        let record = EntityRecord::new("Shot", 42)
            .with_field("project", json!({"type": "Project", "id": 7}));
        assert_eq!(record.link_field("project"), Some(("Project".to_string(), 7)));
        assert_eq!(record.link_field("code"), None);
    }

    #[test]
    fn test_filter_value_matches() {
        assert!(FilterValue::Text("exr".to_string()).matches(&json!("exr")));
        assert!(!FilterValue::Text("exr".to_string()).matches(&json!("jpg")));
        assert!(FilterValue::Number(7).matches(&json!(7)));
        let link = FilterValue::Link {
            entity_type: "Project".to_string(),
            id: 7,
        };
        assert!(link.matches(&json!({"type": "Project", "id": 7})));
        assert!(!link.matches(&json!({"type": "Project", "id": 8})));
    }
}
