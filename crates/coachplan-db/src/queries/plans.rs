//! Database query functions for the `workout_plans` table.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::models::{NewPlan, PlanStatus, ReminderThreshold, WorkoutPlan};

/// Insert a new plan row with status `active`.
///
/// Fails on the one-active-plan-per-student unique index if the student
/// still has an active plan; callers close it first in the same transaction.
pub async fn insert_plan<'e>(executor: impl PgExecutor<'e>, plan: &NewPlan<'_>) -> Result<WorkoutPlan> {
    let plan = sqlx::query_as::<_, WorkoutPlan>(
        "INSERT INTO workout_plans (student_id, coach_id, name, start_date, duration_weeks, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(plan.student_id)
    .bind(plan.coach_id)
    .bind(plan.name)
    .bind(plan.start_date)
    .bind(plan.duration_weeks)
    .bind(plan.notes)
    .fetch_one(executor)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<WorkoutPlan>> {
    let plan = sqlx::query_as::<_, WorkoutPlan>("SELECT * FROM workout_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch the student's active plan, if any.
pub async fn get_active_plan(pool: &PgPool, student_id: &str) -> Result<Option<WorkoutPlan>> {
    let plan = sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE student_id = $1 AND status = 'active'",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch active plan")?;

    Ok(plan)
}

/// List a student's plans, newest first.
pub async fn list_plans_for_student(pool: &PgPool, student_id: &str) -> Result<Vec<WorkoutPlan>> {
    let plans = sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE student_id = $1 ORDER BY created_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans for student")?;

    Ok(plans)
}

/// List every active plan (input of the daily reminder job).
pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<WorkoutPlan>> {
    let plans = sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE status = 'active' ORDER BY start_date, id",
    )
    .fetch_all(pool)
    .await
    .context("failed to list active plans")?;

    Ok(plans)
}

/// Close every active plan of a student with `status` (`ended` or `renewed`).
///
/// Returns the IDs of the plans that were closed (zero or one under the
/// unique index).
pub async fn close_active_plans<'e>(
    executor: impl PgExecutor<'e>,
    student_id: &str,
    status: PlanStatus,
) -> Result<Vec<Uuid>> {
    if !PlanStatus::Active.can_transition_to(status) {
        bail!("cannot close active plans as {status}");
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "UPDATE workout_plans \
         SET status = $1, closed_at = now() \
         WHERE student_id = $2 AND status = 'active' \
         RETURNING id",
    )
    .bind(status)
    .bind(student_id)
    .fetch_all(executor)
    .await
    .context("failed to close active plans")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Atomically move a plan from `from` to `to`.
///
/// The WHERE clause includes `status = $from`, so the row is only updated
/// if the current status still matches. Returns the number of rows affected.
/// Fails without touching the row when `from -> to` is not a lifecycle edge.
pub async fn transition_plan_status<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    from: PlanStatus,
    to: PlanStatus,
) -> Result<u64> {
    if !from.can_transition_to(to) {
        bail!("invalid plan status transition: {from} -> {to} for plan {id}");
    }

    let result = sqlx::query(
        "UPDATE workout_plans \
         SET status = $1, closed_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(executor)
    .await
    .context("failed to transition plan status")?;

    Ok(result.rows_affected())
}

/// Set a reminder flag if it is not already set.
///
/// Returns `true` when this call set the flag and `false` when it was
/// already set, which gives the reminder job at-most-once delivery.
pub async fn mark_reminder_sent(
    pool: &PgPool,
    id: Uuid,
    threshold: ReminderThreshold,
) -> Result<bool> {
    // Column names come from a closed enum, never from input.
    let column = threshold.column();
    let stmt = format!("UPDATE workout_plans SET {column} = TRUE WHERE id = $1 AND {column} = FALSE");
    let result = sqlx::query(&stmt)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to mark {threshold} reminder for plan {id}"))?;

    Ok(result.rows_affected() == 1)
}
