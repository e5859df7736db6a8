//! Property-based tests for template rendering and matching.
//!
//! These tests use proptest to generate random field values and verify that
//! the render/extract invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::template::{FieldSet, FieldValue, KeyDef, Template, TemplateKey};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn shot_keys() -> BTreeMap<String, TemplateKey> {
        let defs: BTreeMap<String, KeyDef> = serde_yaml::from_str(
            r#"
Sequence: {type: str}
Shot: {type: str}
Step: {type: choice, choices: [comp, anim, light]}
version: {type: int, format_spec: "03"}
"#,
        )
        .unwrap();
        defs.iter()
            .map(|(name, def)| (name.clone(), TemplateKey::from_def(name, def).unwrap()))
            .collect()
    }

    fn work_template() -> Template {
        Template::new(
            "shot_work",
            "sequences/{Sequence}/{Shot}/{Step}/v{version}",
            "primary",
            Path::new("/proj"),
            &shot_keys(),
        )
        .unwrap()
    }

    /// Folder-name-like strings: no separators, no template metacharacters
    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,12}"
    }

    proptest! {
        /// Property: extracting fields from a rendered path returns the
        /// fields that produced it
        #[test]
        fn apply_then_extract_round_trips(
            sequence in name_strategy(),
            shot in name_strategy(),
            step_idx in 0usize..3,
            version in 0i64..100_000,
        ) {
            let template = work_template();
            let steps = ["comp", "anim", "light"];

            let mut fields = FieldSet::new();
            fields.insert("Sequence".to_string(), FieldValue::Text(sequence));
            fields.insert("Shot".to_string(), FieldValue::Text(shot));
            fields.insert("Step".to_string(), FieldValue::Text(steps[step_idx].to_string()));
            fields.insert("version".to_string(), FieldValue::Number(version));

            let path = template.apply_fields(&fields).unwrap();
            prop_assert!(template.validate(&path));
            prop_assert_eq!(template.fields_from_path(&path).unwrap(), fields);
        }

        /// Property: re-applying extracted fields reproduces the path
        #[test]
        fn extract_then_apply_reproduces_path(
            sequence in name_strategy(),
            shot in name_strategy(),
            version in 0i64..1000,
        ) {
            let template = work_template();
            let path = Path::new("/proj")
                .join("sequences")
                .join(&sequence)
                .join(&shot)
                .join("comp")
                .join(format!("v{:03}", version));

            prop_assert!(template.validate(&path));
            let fields = template.fields_from_path(&path).unwrap();
            prop_assert_eq!(template.apply_fields(&fields).unwrap(), path);
        }

        /// Property: validation is deterministic
        #[test]
        fn validate_is_deterministic(segment in "[a-zA-Z0-9_.]{1,16}") {
            let template = work_template();
            let path = Path::new("/proj").join("sequences").join(&segment);
            prop_assert_eq!(template.validate(&path), template.validate(&path));
        }

        /// Property: paths outside the template root never validate
        #[test]
        fn paths_outside_root_never_validate(
            sequence in name_strategy(),
            shot in name_strategy(),
        ) {
            let template = work_template();
            let path = Path::new("/elsewhere")
                .join("sequences")
                .join(sequence)
                .join(shot)
                .join("comp")
                .join("v001");
            prop_assert!(!template.validate(&path));
        }
    }
}
