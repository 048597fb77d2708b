//! Template TOML parser with validation.
//!
//! Parses a `template.toml` string into a [`TemplateDraft`] and validates:
//! - Group types and block positions are valid enum variants.
//! - Every grouped exercise names a group type, consistently per group.
//! - Groups do not exceed the member limit of their type.
//! - The template contains at least one exercise or block.

use std::collections::HashMap;

use thiserror::Error;

use coachplan_db::models::{BlockDraft, BlockPosition, ExerciseDraft, GroupType};

use super::toml_format::TemplateToml;
use crate::error::ValidationError;
use crate::grouping::validate_groups;

/// Errors that can occur during template parsing and validation.
#[derive(Debug, Error)]
pub enum TemplateParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("template name must not be empty")]
    EmptyName,

    #[error("template must contain at least one exercise or block")]
    Empty,

    #[error("invalid group type {value:?} on exercise {exercise:?} (expected normal, bi-set, tri-set, drop-set, or superset)")]
    InvalidGroupType { exercise: String, value: String },

    #[error("invalid position {value:?} on block {block:?} (expected start, middle, or end)")]
    InvalidPosition { block: String, value: String },

    #[error("exercise {exercise:?} must have at least one set")]
    InvalidSets { exercise: String },

    #[error(transparent)]
    Group(#[from] ValidationError),
}

/// A validated template ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub exercises: Vec<ExerciseDraft>,
    pub blocks: Vec<BlockDraft>,
}

/// Parse and validate a `template.toml` string.
pub fn parse_template_toml(content: &str) -> Result<TemplateDraft, TemplateParseError> {
    let parsed: TemplateToml = toml::from_str(content)?;
    into_draft(parsed)
}

/// Validate a parsed template and convert it into insertable drafts.
///
/// Exercise order follows file order; `order_in_group` follows the order in
/// which members of a group appear.
pub fn into_draft(parsed: TemplateToml) -> Result<TemplateDraft, TemplateParseError> {
    if parsed.template.name.trim().is_empty() {
        return Err(TemplateParseError::EmptyName);
    }
    if parsed.exercises.is_empty() && parsed.blocks.is_empty() {
        return Err(TemplateParseError::Empty);
    }

    let mut members_seen: HashMap<String, i32> = HashMap::new();
    let mut exercises = Vec::with_capacity(parsed.exercises.len());
    for (idx, ex) in parsed.exercises.into_iter().enumerate() {
        if ex.sets < 1 {
            return Err(TemplateParseError::InvalidSets { exercise: ex.name });
        }
        let group_type = match ex.group_type.as_deref() {
            Some(value) => Some(value.parse::<GroupType>().map_err(|_| TemplateParseError::InvalidGroupType {
                exercise: ex.name.clone(),
                value: value.to_owned(),
            })?),
            None => None,
        };
        let order_in_group = ex.group.as_ref().map(|label| {
            let seen = members_seen.entry(label.clone()).or_insert(0);
            *seen += 1;
            *seen
        });

        exercises.push(ExerciseDraft {
            name: ex.name,
            video_link: ex.video_link,
            order: i32::try_from(idx + 1).unwrap_or(i32::MAX),
            sets: ex.sets,
            reps: ex.reps,
            rest_seconds: ex.rest_seconds,
            load: ex.load,
            notes: ex.notes,
            group_id: ex.group,
            group_type,
            order_in_group,
            group_rest_seconds: ex.group_rest_seconds,
        });
    }
    validate_groups(&exercises)?;

    let mut blocks = Vec::with_capacity(parsed.blocks.len());
    for block in parsed.blocks {
        let position = block
            .position
            .parse::<BlockPosition>()
            .map_err(|_| TemplateParseError::InvalidPosition {
                block: block.name.clone(),
                value: block.position.clone(),
            })?;
        blocks.push(BlockDraft {
            name: block.name,
            position,
            order: block.order,
            estimated_minutes: block.estimated_minutes,
            config: block.config,
        });
    }

    Ok(TemplateDraft {
        name: parsed.template.name,
        description: parsed.template.description,
        category: parsed.template.category,
        exercises,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use coachplan_db::models::BlockType;

    use super::*;

    #[test]
    fn parse_valid_template() {
        let toml_str = r#"
[template]
name = "Push"

[[exercises]]
name = "Bench"
sets = 4
reps = "6-8"
group = "A"
group_type = "bi-set"
group_rest_seconds = 120

[[exercises]]
name = "Dips"
reps = "10"
group = "A"
group_type = "bi-set"

[[exercises]]
name = "Lateral raise"
reps = "15"

[[blocks]]
name = "Bike"

[blocks.config]
type = "warmup"
activities = ["easy spin"]
"#;
        let draft = parse_template_toml(toml_str).expect("should parse");
        assert_eq!(draft.exercises.len(), 3);
        assert_eq!(draft.exercises[0].order, 1);
        assert_eq!(draft.exercises[2].order, 3);
        assert_eq!(draft.exercises[0].order_in_group, Some(1));
        assert_eq!(draft.exercises[1].order_in_group, Some(2));
        assert_eq!(draft.exercises[1].group_type, Some(GroupType::BiSet));
        assert_eq!(draft.exercises[2].group_id, None);
        assert_eq!(draft.blocks[0].position, BlockPosition::Start);
        assert_eq!(draft.blocks[0].block_type(), BlockType::Warmup);
    }

    #[test]
    fn rejects_empty_template() {
        let err = parse_template_toml("[template]\nname = \"Nothing\"\n").unwrap_err();
        assert!(matches!(err, TemplateParseError::Empty), "got: {err}");
    }

    #[test]
    fn rejects_blank_name() {
        let toml_str = r#"
[template]
name = "  "

[[exercises]]
name = "Row"
reps = "10"
"#;
        assert!(matches!(parse_template_toml(toml_str), Err(TemplateParseError::EmptyName)));
    }

    #[test]
    fn rejects_unknown_group_type() {
        let toml_str = r#"
[template]
name = "x"

[[exercises]]
name = "Row"
reps = "10"
group = "A"
group_type = "giant-set"
"#;
        let err = parse_template_toml(toml_str).unwrap_err();
        assert!(
            matches!(err, TemplateParseError::InvalidGroupType { ref value, .. } if value == "giant-set"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_oversized_tri_set() {
        let mut toml_str = String::from("[template]\nname = \"x\"\n");
        for name in ["a", "b", "c", "d"] {
            toml_str.push_str(&format!(
                "\n[[exercises]]\nname = \"{name}\"\nreps = \"10\"\ngroup = \"T\"\ngroup_type = \"tri-set\"\n"
            ));
        }
        let err = parse_template_toml(&toml_str).unwrap_err();
        assert!(
            matches!(err, TemplateParseError::Group(ValidationError::GroupTooLarge { actual: 4, max: 3, .. })),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_group_without_type() {
        let toml_str = r#"
[template]
name = "x"

[[exercises]]
name = "Row"
reps = "10"
group = "A"
"#;
        let err = parse_template_toml(toml_str).unwrap_err();
        assert!(matches!(err, TemplateParseError::Group(ValidationError::MissingGroupType { .. })));
    }

    #[test]
    fn rejects_bad_position() {
        let toml_str = r#"
[template]
name = "x"

[[blocks]]
name = "Plank"
position = "after"

[blocks.config]
type = "core"
"#;
        let err = parse_template_toml(toml_str).unwrap_err();
        assert!(matches!(err, TemplateParseError::InvalidPosition { .. }), "got: {err}");
    }

    #[test]
    fn rejects_zero_sets() {
        let toml_str = r#"
[template]
name = "x"

[[exercises]]
name = "Row"
sets = 0
reps = "10"
"#;
        assert!(matches!(
            parse_template_toml(toml_str),
            Err(TemplateParseError::InvalidSets { .. })
        ));
    }
}
