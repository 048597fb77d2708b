//! `coachplan reminders`: the entry point for the daily reminder job.
//!
//! Records every due threshold and prints one JSON line per notice to
//! deliver. Delivery itself is up to the caller.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use coachplan_core::plan::record_due_reminders;
use coachplan_core::plan::reminders::preview_due_reminders;

pub async fn run_reminders(pool: &PgPool, today: NaiveDate, dry_run: bool) -> Result<()> {
    if dry_run {
        let due = preview_due_reminders(pool, today).await?;
        if due.is_empty() {
            println!("No reminders due on {today}.");
        }
        for (plan, reminders) in &due {
            for reminder in reminders {
                let note = if reminder.notify { "" } else { " (recorded silently)" };
                println!(
                    "{}  {}  {}  ends {}{note}",
                    plan.id,
                    plan.student_id,
                    reminder.threshold,
                    plan.computed_end_date()
                );
            }
        }
        return Ok(());
    }

    let notices = record_due_reminders(pool, today).await?;
    for notice in &notices {
        let line = serde_json::to_string(notice).context("failed to serialize reminder")?;
        println!("{line}");
    }
    tracing::info!(date = %today, notices = notices.len(), "reminders recorded");
    Ok(())
}
