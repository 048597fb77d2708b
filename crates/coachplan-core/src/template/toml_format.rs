//! TOML format types for workout template files.
//!
//! These types map directly to the `template.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coachplan_db::models::BlockConfig;

/// Top-level structure of a `template.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateToml {
    pub template: TemplateMeta,
    /// Exercises in display order.
    #[serde(default)]
    pub exercises: Vec<ExerciseToml>,
    #[serde(default)]
    pub blocks: Vec<BlockToml>,
}

/// Template-level metadata in `[template]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateMeta {
    /// Set when the file was exported from the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form grouping such as "strength" or "conditioning".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A single `[[exercises]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseToml {
    pub name: String,
    #[serde(default = "default_sets")]
    pub sets: i32,
    /// Repetition scheme, e.g. "8-12" or "AMRAP".
    pub reps: String,
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Label shared by the members of one group within this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// "normal", "bi-set", "tri-set", "drop-set" or "superset".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// Rest after a full round of the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_rest_seconds: Option<i32>,
}

/// A single `[[blocks]]` entry. The block type is the `type` key of its
/// `[blocks.config]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockToml {
    pub name: String,
    /// "start", "middle" or "end".
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<i32>,
    pub config: BlockConfig,
}

fn default_sets() -> i32 {
    3
}

fn default_rest_seconds() -> i32 {
    60
}

fn default_position() -> String {
    "start".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_template() {
        let toml_str = r#"
[template]
name = "Upper A"

[[exercises]]
name = "Bench press"
reps = "8-12"
"#;
        let t: TemplateToml = toml::from_str(toml_str).expect("should parse");
        assert_eq!(t.template.name, "Upper A");
        assert_eq!(t.exercises.len(), 1);
        assert_eq!(t.exercises[0].sets, 3); // default
        assert_eq!(t.exercises[0].rest_seconds, 60); // default
        assert!(t.blocks.is_empty());
    }

    #[test]
    fn deserialize_blocks_with_tagged_config() {
        let toml_str = r#"
[template]
name = "Conditioning"
category = "cardio"

[[blocks]]
name = "Intervals"
position = "end"
estimated_minutes = 20

[blocks.config]
type = "cardio"
modality = "rower"
heart_rate_zone = 4
intervals = 8
"#;
        let t: TemplateToml = toml::from_str(toml_str).expect("should parse");
        assert_eq!(t.blocks.len(), 1);
        assert_eq!(t.blocks[0].position, "end");
        assert_eq!(t.blocks[0].order, None);
        assert_eq!(
            t.blocks[0].config,
            BlockConfig::Cardio {
                modality: Some("rower".into()),
                intensity: None,
                heart_rate_zone: Some(4),
                distance_km: None,
                intervals: Some(8),
            }
        );
    }

    #[test]
    fn block_without_config_is_rejected() {
        let toml_str = r#"
[template]
name = "x"

[[blocks]]
name = "Stretch"
"#;
        assert!(toml::from_str::<TemplateToml>(toml_str).is_err());
    }

    #[test]
    fn serialize_then_parse() {
        let t = TemplateToml {
            template: TemplateMeta {
                id: None,
                name: "Lower".into(),
                description: Some("squat day".into()),
                category: None,
            },
            exercises: vec![ExerciseToml {
                name: "Squat".into(),
                sets: 5,
                reps: "5".into(),
                rest_seconds: 180,
                load: Some("100kg".into()),
                video_link: None,
                notes: None,
                group: None,
                group_type: None,
                group_rest_seconds: None,
            }],
            blocks: vec![BlockToml {
                name: "Hips".into(),
                position: "start".into(),
                order: Some(1),
                estimated_minutes: Some(5),
                config: BlockConfig::Mobility {
                    focus_areas: vec!["hips".into()],
                    tool: None,
                },
            }],
        };
        let text = toml::to_string_pretty(&t).expect("serialize");
        let back: TemplateToml = toml::from_str(&text).expect("parse");
        assert_eq!(back, t);
    }
}
