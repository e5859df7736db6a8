//! Shared test utilities for integration tests.
//!
//! Provides a scripted in-memory entity source and a fixture that lays a
//! complete project on disk: pipeline configuration, template definitions,
//! a folder schema and a small cast of tracking entities.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use pathtrack::{EntityRecord, EntitySource, Filter, FilterValue};

/// A scripted entity-data service backed by a fixed record list.
#[derive(Default)]
pub struct StaticEntitySource {
    records: Vec<EntityRecord>,
}

impl StaticEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: EntityRecord) {
        self.records.push(record);
    }
}

impl EntitySource for StaticEntitySource {
    fn fetch_entities(
        &self,
        entity_type: &str,
        filters: &[Filter],
        _fields: &[&str],
    ) -> pathtrack::Result<Vec<EntityRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.entity_type == entity_type)
            .filter(|r| filters.iter().all(|f| record_matches(r, f)))
            .cloned()
            .collect())
    }
}

fn record_matches(record: &EntityRecord, filter: &Filter) -> bool {
    if filter.field == "id" {
        return matches!(filter.value, FilterValue::Number(id) if id == record.id);
    }
    match record.fields.get(&filter.field) {
        Some(value) => filter.value.matches(value),
        None => false,
    }
}

/// A complete on-disk project: config, schema and entity data.
pub struct ProjectFixture {
    /// Owns every path the fixture hands out
    #[allow(dead_code)]
    pub temp: TempDir,
    pub project_path: PathBuf,
    pub source: StaticEntitySource,
}

pub const TEMPLATES_YML: &str = r#"
keys:
  Sequence: {type: str}
  Shot: {type: str}
  Step: {type: str}
  version: {type: int, format_spec: "03"}
paths:
  sequence_root: sequences/{Sequence}
  shot_root: sequences/{Sequence}/{Shot}
  shot_step: sequences/{Sequence}/{Shot}/{Step}
"#;

impl ProjectFixture {
    /// Lay out the standard fixture project:
    ///
    /// ```text
    /// project/
    ///   editorial/            (static, carries cut_notes.txt verbatim)
    ///   sequences/            (static)
    ///     <Sequence>/         (entity, filtered to the project)
    ///       <Shot>/           (entity, filtered to the sequence)
    ///         <Step>/         (pipeline step)
    /// ```
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let temp = TempDir::new().unwrap();
        let project_path = temp.path().join("projects").join("alpha");
        fs::create_dir_all(&project_path).unwrap();

        write_file(
            &pathtrack::defaults::templates_file(&project_path),
            TEMPLATES_YML,
        );

        let schema = pathtrack::defaults::schema_dir(&project_path);
        let project = schema.join("project");

        fs::create_dir_all(project.join("editorial")).unwrap();
        write_file(
            &project.join("editorial").join("cut_notes.txt"),
            "cut notes placeholder\n",
        );

        let shot_dir = project.join("sequences").join("sequence").join("shot");
        fs::create_dir_all(shot_dir.join("step")).unwrap();
        write_file(&project.join("sequences.yml"), "type: static\n");
        write_file(
            &project.join("sequences").join("sequence.yml"),
            "{type: entity, entity_type: Sequence, filters: [{field: project, value: $project}]}\n",
        );
        write_file(
            &project.join("sequences").join("sequence").join("shot.yml"),
            "{type: entity, entity_type: Shot, filters: [{field: sg_sequence, value: $Sequence}]}\n",
        );
        write_file(&shot_dir.join("step.yml"), "type: step\n");

        let mut source = StaticEntitySource::new();
        source.add(EntityRecord::new("Project", 1).with_field("name", json!("alpha")));
        source.add(
            EntityRecord::new("Sequence", 2)
                .with_field("code", json!("seq01"))
                .with_field("project", json!({"type": "Project", "id": 1})),
        );
        source.add(
            EntityRecord::new("Sequence", 5)
                .with_field("code", json!("seq02"))
                .with_field("project", json!({"type": "Project", "id": 1})),
        );
        source.add(
            EntityRecord::new("Shot", 12)
                .with_field("code", json!("sh010"))
                .with_field("project", json!({"type": "Project", "id": 1}))
                .with_field("sg_sequence", json!({"type": "Sequence", "id": 2})),
        );
        source.add(EntityRecord::new("Step", 101).with_field("short_name", json!("comp")));
        source.add(EntityRecord::new("Step", 102).with_field("short_name", json!("anim")));

        Self {
            temp,
            project_path,
            source,
        }
    }
}

pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
