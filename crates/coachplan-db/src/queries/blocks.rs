//! Database query functions for the `workout_blocks` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{BlockDraft, WorkoutBlock};

/// Insert `drafts` into a day, all or nothing.
///
/// A missing order is stored as `0`; callers that need a positive order
/// resolve it before inserting.
pub async fn insert_blocks(
    pool: &PgPool,
    day_schedule_id: Uuid,
    drafts: &[BlockDraft],
) -> Result<Vec<WorkoutBlock>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut inserted = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let block = sqlx::query_as::<_, WorkoutBlock>(
            "INSERT INTO workout_blocks \
             (day_schedule_id, block_type, name, position, sort_order, estimated_minutes, config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING *",
        )
        .bind(day_schedule_id)
        .bind(draft.block_type())
        .bind(&draft.name)
        .bind(draft.position)
        .bind(draft.order.unwrap_or(0))
        .bind(draft.estimated_minutes)
        .bind(Json(&draft.config))
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert block {:?}", draft.name))?;

        inserted.push(block);
    }

    tx.commit().await.context("failed to commit transaction")?;

    Ok(inserted)
}

/// List the blocks of several days, ordered by position then order.
pub async fn list_blocks_for_days(pool: &PgPool, day_ids: &[Uuid]) -> Result<Vec<WorkoutBlock>> {
    let blocks = sqlx::query_as::<_, WorkoutBlock>(
        "SELECT * FROM workout_blocks \
         WHERE day_schedule_id = ANY($1) \
         ORDER BY day_schedule_id, \
                  CASE position WHEN 'start' THEN 0 WHEN 'middle' THEN 1 ELSE 2 END, \
                  sort_order ASC, id",
    )
    .bind(day_ids)
    .fetch_all(pool)
    .await
    .context("failed to list blocks")?;

    Ok(blocks)
}

/// Delete blocks by ID. Returns the number of rows removed.
pub async fn delete_blocks(pool: &PgPool, ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM workout_blocks WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await
        .context("failed to delete blocks")?;

    Ok(result.rows_affected())
}
