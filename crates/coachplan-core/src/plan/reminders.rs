//! Expiry reminder contract consumed by the external daily job.
//!
//! Each of the three thresholds is delivered at most once per plan; the
//! per-threshold flag on the plan row is the delivery record.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use coachplan_db::models::{ReminderThreshold, WorkoutPlan};
use coachplan_db::queries::plans as plan_db;

use super::progress::plan_progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Coach,
    Student,
}

/// Who hears about `threshold`. The three-day reminder goes to the coach only.
pub fn audience(threshold: ReminderThreshold) -> &'static [Audience] {
    match threshold {
        ReminderThreshold::ThreeDays => &[Audience::Coach],
        ReminderThreshold::SevenDays | ReminderThreshold::Expired => &[Audience::Coach, Audience::Student],
    }
}

/// A threshold that has been reached and not yet recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueReminder {
    pub threshold: ReminderThreshold,
    pub audience: Vec<Audience>,
    /// Only the most urgent due threshold is announced; earlier ones that
    /// were skipped (for example a plan created three days before its end)
    /// are recorded silently.
    pub notify: bool,
}

/// Reached thresholds of `plan` whose flag is still unset, least urgent first.
pub fn due_reminders(plan: &WorkoutPlan, today: NaiveDate) -> Vec<DueReminder> {
    let remaining = plan_progress(plan, today).remaining_days;
    let reached: Vec<ReminderThreshold> = ReminderThreshold::ALL
        .into_iter()
        .filter(|t| remaining <= t.days_remaining() && !plan.reminder_sent(*t))
        .collect();

    let most_urgent = reached.last().copied();
    reached
        .into_iter()
        .map(|threshold| DueReminder {
            threshold,
            audience: audience(threshold).to_vec(),
            notify: Some(threshold) == most_urgent,
        })
        .collect()
}

/// A notification the caller should emit.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderNotice {
    pub plan_id: Uuid,
    pub student_id: String,
    pub coach_id: String,
    pub plan_name: String,
    pub end_date: NaiveDate,
    pub threshold: ReminderThreshold,
    pub audience: Vec<Audience>,
}

/// Record every due reminder of the active plans and return the notices to
/// emit. A flag already set by a concurrent run yields no notice.
pub async fn record_due_reminders(pool: &PgPool, today: NaiveDate) -> Result<Vec<ReminderNotice>> {
    let plans = plan_db::list_active_plans(pool).await?;
    let mut notices = Vec::new();

    for plan in &plans {
        for due in due_reminders(plan, today) {
            let claimed = plan_db::mark_reminder_sent(pool, plan.id, due.threshold).await?;
            if !claimed {
                tracing::debug!(plan_id = %plan.id, threshold = %due.threshold, "reminder already recorded");
                continue;
            }
            if due.notify {
                tracing::info!(plan_id = %plan.id, threshold = %due.threshold, "reminder due");
                notices.push(ReminderNotice {
                    plan_id: plan.id,
                    student_id: plan.student_id.clone(),
                    coach_id: plan.coach_id.clone(),
                    plan_name: plan.name.clone(),
                    end_date: plan.computed_end_date(),
                    threshold: due.threshold,
                    audience: due.audience,
                });
            }
        }
    }

    Ok(notices)
}

/// Due reminders of all active plans without recording anything.
pub async fn preview_due_reminders(pool: &PgPool, today: NaiveDate) -> Result<Vec<(WorkoutPlan, Vec<DueReminder>)>> {
    let plans = plan_db::list_active_plans(pool).await?;
    Ok(plans
        .into_iter()
        .filter_map(|plan| {
            let due = due_reminders(&plan, today);
            (!due.is_empty()).then_some((plan, due))
        })
        .collect())
}
