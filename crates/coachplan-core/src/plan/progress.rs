//! Derived plan progress and expiry status. Computed on read, never stored.

use std::fmt;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use coachplan_db::models::WorkoutPlan;
use coachplan_db::queries::plans as plan_db;

/// Presentation status of a student's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    NoPlan,
    Active,
    ExpiringSoon,
    Critical,
    Expired,
}

impl ExpiryStatus {
    /// Status for a plan with `remaining_days` left.
    pub fn from_remaining(remaining_days: i64) -> Self {
        match remaining_days {
            d if d <= 0 => Self::Expired,
            d if d <= 3 => Self::Critical,
            d if d <= 7 => Self::ExpiringSoon,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoPlan => "no_plan",
            Self::Active => "active",
            Self::ExpiringSoon => "expiring_soon",
            Self::Critical => "critical",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    pub plan_id: Uuid,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub elapsed_days: i64,
    pub remaining_days: i64,
    /// 0..=100, rounded half up.
    pub percent_complete: u8,
    pub status: ExpiryStatus,
}

pub fn plan_progress(plan: &WorkoutPlan, today: NaiveDate) -> PlanProgress {
    let total_days = plan.total_days();
    let elapsed_days = (today - plan.start_date).num_days().clamp(0, total_days);
    let remaining_days = (total_days - elapsed_days).max(0);
    let percent = if total_days == 0 {
        100
    } else {
        ((200 * elapsed_days + total_days) / (2 * total_days)).clamp(0, 100)
    };

    PlanProgress {
        plan_id: plan.id,
        end_date: plan.computed_end_date(),
        total_days,
        elapsed_days,
        remaining_days,
        percent_complete: u8::try_from(percent).unwrap_or(100),
        status: ExpiryStatus::from_remaining(remaining_days),
    }
}

/// A student's active plan, if any, with its progress.
#[derive(Debug, Clone, Serialize)]
pub struct StudentOverview {
    pub student_id: String,
    pub status: ExpiryStatus,
    pub plan: Option<WorkoutPlan>,
    pub progress: Option<PlanProgress>,
}

pub async fn student_overview(pool: &PgPool, student_id: &str, today: NaiveDate) -> Result<StudentOverview> {
    let plan = plan_db::get_active_plan(pool, student_id).await?;
    let progress = plan.as_ref().map(|p| plan_progress(p, today));
    Ok(StudentOverview {
        student_id: student_id.to_owned(),
        status: progress.as_ref().map_or(ExpiryStatus::NoPlan, |p| p.status),
        plan,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Days, Utc};

    use coachplan_db::models::PlanStatus;

    use super::*;

    fn plan(start: NaiveDate, weeks: i32) -> WorkoutPlan {
        WorkoutPlan {
            id: Uuid::new_v4(),
            student_id: "s".to_owned(),
            coach_id: "c".to_owned(),
            name: "p".to_owned(),
            start_date: start,
            duration_weeks: weeks,
            notes: None,
            status: PlanStatus::Active,
            reminder_7d_sent: false,
            reminder_3d_sent: false,
            reminder_expired_sent: false,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(ExpiryStatus::from_remaining(-4), ExpiryStatus::Expired);
        assert_eq!(ExpiryStatus::from_remaining(0), ExpiryStatus::Expired);
        assert_eq!(ExpiryStatus::from_remaining(1), ExpiryStatus::Critical);
        assert_eq!(ExpiryStatus::from_remaining(3), ExpiryStatus::Critical);
        assert_eq!(ExpiryStatus::from_remaining(4), ExpiryStatus::ExpiringSoon);
        assert_eq!(ExpiryStatus::from_remaining(7), ExpiryStatus::ExpiringSoon);
        assert_eq!(ExpiryStatus::from_remaining(8), ExpiryStatus::Active);
    }

    #[test]
    fn twenty_six_of_twenty_eight_days_is_critical() {
        let start = today().checked_sub_days(Days::new(26)).unwrap();
        let progress = plan_progress(&plan(start, 4), today());
        assert_eq!(progress.total_days, 28);
        assert_eq!(progress.elapsed_days, 26);
        assert_eq!(progress.remaining_days, 2);
        assert_eq!(progress.status, ExpiryStatus::Critical);
        assert_eq!(progress.percent_complete, 93);
    }

    #[test]
    fn future_start_is_zero_percent() {
        let start = today().checked_add_days(Days::new(10)).unwrap();
        let progress = plan_progress(&plan(start, 2), today());
        assert_eq!(progress.elapsed_days, 0);
        assert_eq!(progress.percent_complete, 0);
        assert_eq!(progress.remaining_days, 14);
        assert_eq!(progress.status, ExpiryStatus::Active);
    }

    #[test]
    fn past_end_is_clamped() {
        let start = today().checked_sub_days(Days::new(100)).unwrap();
        let progress = plan_progress(&plan(start, 4), today());
        assert_eq!(progress.elapsed_days, 28);
        assert_eq!(progress.remaining_days, 0);
        assert_eq!(progress.percent_complete, 100);
        assert_eq!(progress.status, ExpiryStatus::Expired);
    }

    #[test]
    fn percent_is_monotonic_and_bounded() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let p = plan(start, 6);
        let mut previous = 0u8;
        for offset in 0..80 {
            let day = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap() + chrono::Duration::days(offset);
            let pct = plan_progress(&p, day).percent_complete;
            assert!(pct <= 100);
            assert!(pct >= previous, "percent went from {previous} to {pct}");
            previous = pct;
        }
        assert_eq!(previous, 100);
    }

    #[test]
    fn end_date_is_derived() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let progress = plan_progress(&plan(start, 4), start);
        assert_eq!(progress.end_date, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
        assert_eq!(ExpiryStatus::ExpiringSoon.to_string(), "expiring_soon");
    }
}
