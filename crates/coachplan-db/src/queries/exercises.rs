//! Database query functions for the `exercises` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Exercise, ExerciseDraft};

/// Insert `drafts` into a day, all or nothing.
///
/// Rows are returned in input order.
pub async fn insert_exercises(
    pool: &PgPool,
    day_schedule_id: Uuid,
    drafts: &[ExerciseDraft],
) -> Result<Vec<Exercise>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut inserted = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let exercise = sqlx::query_as::<_, Exercise>(
            "INSERT INTO exercises \
             (day_schedule_id, name, video_link, sort_order, sets, reps, rest_seconds, load, notes, \
              group_id, group_type, order_in_group, group_rest_seconds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING *",
        )
        .bind(day_schedule_id)
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
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert exercise {:?}", draft.name))?;

        inserted.push(exercise);
    }

    tx.commit().await.context("failed to commit transaction")?;

    Ok(inserted)
}

/// List the exercises of several days, ordered for display.
pub async fn list_exercises_for_days(pool: &PgPool, day_ids: &[Uuid]) -> Result<Vec<Exercise>> {
    let exercises = sqlx::query_as::<_, Exercise>(
        "SELECT * FROM exercises \
         WHERE day_schedule_id = ANY($1) \
         ORDER BY day_schedule_id, sort_order ASC, order_in_group ASC NULLS FIRST, id",
    )
    .bind(day_ids)
    .fetch_all(pool)
    .await
    .context("failed to list exercises")?;

    Ok(exercises)
}

/// Fetch a single exercise.
pub async fn get_exercise(pool: &PgPool, id: Uuid) -> Result<Option<Exercise>> {
    let exercise = sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch exercise")?;

    Ok(exercise)
}

/// Delete exercises by ID. Returns the number of rows removed.
pub async fn delete_exercises(pool: &PgPool, ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM exercises WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await
        .context("failed to delete exercises")?;

    Ok(result.rows_affected())
}

/// Set the completion flag of an exercise. Returns the number of rows affected.
pub async fn set_exercise_completed(pool: &PgPool, id: Uuid, completed: bool) -> Result<u64> {
    let result = sqlx::query("UPDATE exercises SET completed = $1 WHERE id = $2")
        .bind(completed)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to set exercise completion")?;

    Ok(result.rows_affected())
}
