//! Database query functions for the `day_schedules` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DayKey, DaySchedule};

/// Insert an empty day for `key` unless one already exists.
///
/// Returns `None` when another writer already holds the natural key; the
/// caller then looks the existing row up with [`get_day_by_key`].
pub async fn insert_day_if_absent(pool: &PgPool, key: &DayKey) -> Result<Option<DaySchedule>> {
    let day = sqlx::query_as::<_, DaySchedule>(
        "INSERT INTO day_schedules (student_id, coach_id, week_start, weekday, order_in_day) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (student_id, coach_id, week_start, weekday, order_in_day) DO NOTHING \
         RETURNING *",
    )
    .bind(&key.student_id)
    .bind(&key.coach_id)
    .bind(key.week_start)
    .bind(key.weekday)
    .bind(key.order_in_day)
    .fetch_optional(pool)
    .await
    .context("failed to insert day schedule")?;

    Ok(day)
}

/// Fetch a day by its natural key.
pub async fn get_day_by_key(pool: &PgPool, key: &DayKey) -> Result<Option<DaySchedule>> {
    let day = sqlx::query_as::<_, DaySchedule>(
        "SELECT * FROM day_schedules \
         WHERE student_id = $1 AND coach_id = $2 AND week_start = $3 \
           AND weekday = $4 AND order_in_day = $5",
    )
    .bind(&key.student_id)
    .bind(&key.coach_id)
    .bind(key.week_start)
    .bind(key.weekday)
    .bind(key.order_in_day)
    .fetch_optional(pool)
    .await
    .context("failed to fetch day schedule by key")?;

    Ok(day)
}

/// Fetch a day by its ID.
pub async fn get_day(pool: &PgPool, id: Uuid) -> Result<Option<DaySchedule>> {
    let day = sqlx::query_as::<_, DaySchedule>("SELECT * FROM day_schedules WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch day schedule")?;

    Ok(day)
}

/// List the days of one student/coach week, ordered by weekday then session.
pub async fn list_days_for_week(
    pool: &PgPool,
    student_id: &str,
    coach_id: &str,
    week_start: NaiveDate,
) -> Result<Vec<DaySchedule>> {
    let days = sqlx::query_as::<_, DaySchedule>(
        "SELECT * FROM day_schedules \
         WHERE student_id = $1 AND coach_id = $2 AND week_start = $3 \
         ORDER BY weekday ASC, order_in_day ASC",
    )
    .bind(student_id)
    .bind(coach_id)
    .bind(week_start)
    .fetch_all(pool)
    .await
    .context("failed to list day schedules for week")?;

    Ok(days)
}

/// Update the descriptive fields of a day.
pub async fn update_day_details(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    source_template_id: Option<Uuid>,
) -> Result<DaySchedule> {
    let day = sqlx::query_as::<_, DaySchedule>(
        "UPDATE day_schedules \
         SET name = $1, description = $2, source_template_id = $3 \
         WHERE id = $4 \
         RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(source_template_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update day schedule")?;

    day.with_context(|| format!("day schedule {id} not found"))
}

/// Set the completion flag of a day. Returns the number of rows affected.
pub async fn set_day_completed(pool: &PgPool, id: Uuid, completed: bool) -> Result<u64> {
    let result = sqlx::query("UPDATE day_schedules SET completed = $1 WHERE id = $2")
        .bind(completed)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to set day completion")?;

    Ok(result.rows_affected())
}

/// Delete every exercise and block owned by a day, keeping the day row.
///
/// Both deletes run in one transaction so the day is never left with only
/// one of the two collections cleared. Returns `(exercises, blocks)` deleted.
pub async fn clear_day_content(pool: &PgPool, day_id: Uuid) -> Result<(u64, u64)> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let exercises = sqlx::query("DELETE FROM exercises WHERE day_schedule_id = $1")
        .bind(day_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete day exercises")?
        .rows_affected();

    let blocks = sqlx::query("DELETE FROM workout_blocks WHERE day_schedule_id = $1")
        .bind(day_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete day blocks")?
        .rows_affected();

    tx.commit().await.context("failed to commit transaction")?;

    Ok((exercises, blocks))
}
