//! Template service layer.
//!
//! Stores a validated [`TemplateDraft`] (template row, exercises, blocks)
//! within a single database transaction, and turns stored templates back
//! into `template.toml` content.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use coachplan_db::models::{NewTemplate, TemplateBlock, TemplateExercise, WorkoutTemplate};
use coachplan_db::queries::templates as template_db;

use super::parser::TemplateDraft;
use super::toml_format::{BlockToml, ExerciseToml, TemplateMeta, TemplateToml};

/// A template with its children.
#[derive(Debug, Clone)]
pub struct TemplateDetail {
    pub template: WorkoutTemplate,
    pub exercises: Vec<TemplateExercise>,
    pub blocks: Vec<TemplateBlock>,
}

/// Insert a template and all its children. Nothing is written if any insert
/// fails.
pub async fn create_template(pool: &PgPool, coach_id: &str, draft: &TemplateDraft) -> Result<WorkoutTemplate> {
    let template = template_db::insert_template(
        pool,
        &NewTemplate {
            coach_id,
            name: &draft.name,
            description: draft.description.as_deref(),
            category: draft.category.as_deref(),
        },
        &draft.exercises,
        &draft.blocks,
    )
    .await
    .with_context(|| format!("failed to create template {:?}", draft.name))?;

    tracing::info!(
        template_id = %template.id,
        coach_id,
        exercises = draft.exercises.len(),
        blocks = draft.blocks.len(),
        "template created"
    );
    Ok(template)
}

/// Fetch a template and its children.
pub async fn get_template_detail(pool: &PgPool, template_id: Uuid) -> Result<TemplateDetail> {
    let template = template_db::get_template(pool, template_id)
        .await?
        .with_context(|| format!("template {template_id} not found"))?;

    let exercises = template_db::list_template_exercises(pool, template_id).await?;
    let blocks = template_db::list_template_blocks(pool, template_id).await?;

    Ok(TemplateDetail {
        template,
        exercises,
        blocks,
    })
}

pub async fn list_templates(pool: &PgPool, coach_id: &str) -> Result<Vec<WorkoutTemplate>> {
    template_db::list_templates_for_coach(pool, coach_id).await
}

/// Delete a template. Days instantiated from it keep their content.
pub async fn delete_template(pool: &PgPool, template_id: Uuid) -> Result<bool> {
    let deleted = template_db::delete_template(pool, template_id).await?;
    if deleted {
        tracing::info!(template_id = %template_id, "template deleted");
    }
    Ok(deleted)
}

/// Render a stored template as `template.toml` content.
///
/// The output parses back with [`super::parse_template_toml`].
pub fn render_template_toml(detail: &TemplateDetail) -> Result<String> {
    let doc = TemplateToml {
        template: TemplateMeta {
            id: Some(detail.template.id),
            name: detail.template.name.clone(),
            description: detail.template.description.clone(),
            category: detail.template.category.clone(),
        },
        exercises: detail
            .exercises
            .iter()
            .map(|ex| ExerciseToml {
                name: ex.name.clone(),
                sets: ex.sets,
                reps: ex.reps.clone(),
                rest_seconds: ex.rest_seconds,
                load: ex.load.clone(),
                video_link: ex.video_link.clone(),
                notes: ex.notes.clone(),
                group: ex.group_id.clone(),
                group_type: ex.group_type.map(|t| t.to_string()),
                group_rest_seconds: ex.group_rest_seconds,
            })
            .collect(),
        blocks: detail
            .blocks
            .iter()
            .map(|block| BlockToml {
                name: block.name.clone(),
                position: block.position.to_string(),
                order: block.order,
                estimated_minutes: block.estimated_minutes,
                config: block.config.0.clone(),
            })
            .collect(),
    };

    toml::to_string_pretty(&doc).context("failed to serialize template")
}
