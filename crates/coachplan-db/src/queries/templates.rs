//! Database query functions for `workout_templates`, `template_exercises`
//! and `template_blocks`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{
    BlockDraft, ExerciseDraft, NewTemplate, TemplateBlock, TemplateExercise, WorkoutTemplate,
};

/// Insert a template with all its exercises and blocks in one transaction.
pub async fn insert_template(
    pool: &PgPool,
    template: &NewTemplate<'_>,
    exercises: &[ExerciseDraft],
    blocks: &[BlockDraft],
) -> Result<WorkoutTemplate> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let row = sqlx::query_as::<_, WorkoutTemplate>(
        "INSERT INTO workout_templates (coach_id, name, description, category) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(template.coach_id)
    .bind(template.name)
    .bind(template.description)
    .bind(template.category)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert template")?;

    for draft in exercises {
        sqlx::query(
            "INSERT INTO template_exercises \
             (template_id, name, video_link, sort_order, sets, reps, rest_seconds, load, notes, \
              group_id, group_type, order_in_group, group_rest_seconds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(row.id)
        .bind(&draft.name)
        .bind(&draft.video_link)
        .bind(draft.order)
        .bind(draft.sets)
        .bind(&draft.reps)
        .bind(draft.rest_seconds)
        .bind(&draft.load)
        .bind(&draft.notes)
        .bind(&draft.group_id)
        .bind(draft.group_type)
        .bind(draft.order_in_group)
        .bind(draft.group_rest_seconds)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert template exercise {:?}", draft.name))?;
    }

    for draft in blocks {
        sqlx::query(
            "INSERT INTO template_blocks \
             (template_id, block_type, name, position, sort_order, estimated_minutes, config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(draft.block_type())
        .bind(&draft.name)
        .bind(draft.position)
        .bind(draft.order)
        .bind(draft.estimated_minutes)
        .bind(Json(&draft.config))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert template block {:?}", draft.name))?;
    }

    tx.commit().await.context("failed to commit transaction")?;

    Ok(row)
}

/// Fetch a template header by ID.
pub async fn get_template(pool: &PgPool, id: Uuid) -> Result<Option<WorkoutTemplate>> {
    let template =
        sqlx::query_as::<_, WorkoutTemplate>("SELECT * FROM workout_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch template")?;

    Ok(template)
}

/// List a coach's templates by name.
pub async fn list_templates_for_coach(pool: &PgPool, coach_id: &str) -> Result<Vec<WorkoutTemplate>> {
    let templates = sqlx::query_as::<_, WorkoutTemplate>(
        "SELECT * FROM workout_templates WHERE coach_id = $1 ORDER BY name ASC, created_at ASC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await
    .context("failed to list templates")?;

    Ok(templates)
}

/// List a template's exercises in authored order.
pub async fn list_template_exercises(pool: &PgPool, template_id: Uuid) -> Result<Vec<TemplateExercise>> {
    let exercises = sqlx::query_as::<_, TemplateExercise>(
        "SELECT * FROM template_exercises \
         WHERE template_id = $1 \
         ORDER BY sort_order ASC, order_in_group ASC NULLS FIRST, id",
    )
    .bind(template_id)
    .fetch_all(pool)
    .await
    .context("failed to list template exercises")?;

    Ok(exercises)
}

/// List a template's blocks. Blocks without an order sort last within
/// their position.
pub async fn list_template_blocks(pool: &PgPool, template_id: Uuid) -> Result<Vec<TemplateBlock>> {
    let blocks = sqlx::query_as::<_, TemplateBlock>(
        "SELECT * FROM template_blocks \
         WHERE template_id = $1 \
         ORDER BY CASE position WHEN 'start' THEN 0 WHEN 'middle' THEN 1 ELSE 2 END, \
                  sort_order ASC NULLS LAST, id",
    )
    .bind(template_id)
    .fetch_all(pool)
    .await
    .context("failed to list template blocks")?;

    Ok(blocks)
}

/// Delete a template and its children.
pub async fn delete_template(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM workout_templates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete template")?;

    Ok(result.rows_affected() == 1)
}
