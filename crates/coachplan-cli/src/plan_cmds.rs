//! CLI handlers for `coachplan plan` subcommands.
//!
//! Implements:
//! - `coachplan plan create`            -- start a plan and replicate its base week
//! - `coachplan plan renew <plan-id>`   -- renew an active plan starting today
//! - `coachplan plan end <plan-id>`     -- end an active plan
//! - `coachplan plan status --student`  -- expiry status and plan history
//! - `coachplan plan replicate <plan-id>` -- (re)run replication from an offset

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use coachplan_core::plan::{
    NewPlanRequest, PlanManager, RenewRequest, ReplicationOutcome, ReplicationReport, plan_progress,
    student_overview,
};
use coachplan_db::models::WorkoutPlan;
use coachplan_db::queries::plans as plan_db;

use crate::PlanCommands;
use crate::config::CoachplanConfig;
use crate::resolve::parse_id;

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    pool: &PgPool,
    resolved: &CoachplanConfig,
    today: NaiveDate,
) -> Result<()> {
    let manager = PlanManager::new(pool.clone(), crate::engine(pool, resolved));
    match command {
        PlanCommands::Create {
            owner,
            name,
            weeks,
            start,
            notes,
        } => {
            let cancel = interrupt_token();
            let created = manager
                .create(
                    NewPlanRequest {
                        student_id: owner.student,
                        coach_id: owner.coach,
                        name,
                        duration_weeks: weeks,
                        start_date: start,
                        notes,
                    },
                    today,
                    &cancel,
                )
                .await?;

            println!("Plan created.");
            println!();
            print_plan(&created.plan, today);
            for id in &created.closed {
                println!("  Ended plan:   {id}");
            }
            print_replication(&created.plan, &created.replication);
            Ok(())
        }
        PlanCommands::Renew {
            plan_id,
            name,
            weeks,
            notes,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let cancel = interrupt_token();
            let renewed = manager
                .renew(
                    plan_id,
                    RenewRequest {
                        name,
                        duration_weeks: weeks,
                        notes,
                    },
                    today,
                    &cancel,
                )
                .await?;

            println!("Plan {} renewed.", renewed.previous);
            println!();
            print_plan(&renewed.plan, today);
            print_replication(&renewed.plan, &renewed.replication);
            Ok(())
        }
        PlanCommands::End { plan_id } => {
            let plan = manager.end(parse_id("plan", &plan_id)?).await?;
            println!("Plan {} ended.", plan.id);
            Ok(())
        }
        PlanCommands::Status { student } => cmd_status(pool, &student, today).await,
        PlanCommands::Replicate {
            plan_id,
            resume_from,
        } => {
            let plan = manager.get(parse_id("plan", &plan_id)?).await?;
            let cancel = interrupt_token();
            let report = manager.replicate_plan(&plan, resume_from, &cancel).await?;
            print_replication(&plan, &report);
            if !report.is_complete() {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

/// A token cancelled by the first Ctrl+C; the second one exits at once.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping after the current week (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    cancel
}

fn print_plan(plan: &WorkoutPlan, today: NaiveDate) {
    let progress = plan_progress(plan, today);
    println!("  Plan ID:      {}", plan.id);
    println!("  Name:         {}", plan.name);
    println!("  Student:      {}", plan.student_id);
    println!("  Status:       {}", plan.status);
    println!(
        "  Dates:        {} .. {} ({} weeks)",
        plan.start_date,
        progress.end_date,
        plan.duration_weeks
    );
    if let Some(notes) = &plan.notes {
        println!("  Notes:        {notes}");
    }
}

fn print_replication(plan: &WorkoutPlan, report: &ReplicationReport) {
    println!();
    println!(
        "Replication of week {}: {} day(s) per week, {} week(s) written",
        report.base_week,
        report.days_per_week,
        report.replicated_weeks.len()
    );
    match &report.outcome {
        ReplicationOutcome::Completed => {
            if report.days_per_week == 0 {
                println!("  Base week is empty; author it and run `coachplan plan replicate {}`.", plan.id);
            }
        }
        ReplicationOutcome::Cancelled { next_offset } => {
            println!("  Interrupted. Resume with:");
            println!("    coachplan plan replicate {} --resume-from {next_offset}", plan.id);
        }
        ReplicationOutcome::Failed { next_offset, error } => {
            println!("  Stopped at week offset {next_offset}: {}", error.report());
            println!("  Resume with:");
            println!("    coachplan plan replicate {} --resume-from {next_offset}", plan.id);
        }
    }
}

/// Show the student's expiry status followed by their plan history.
async fn cmd_status(pool: &PgPool, student: &str, today: NaiveDate) -> Result<()> {
    let overview = student_overview(pool, student, today).await?;
    println!("Student: {student}");
    println!("Status:  {}", overview.status);

    if let Some(progress) = &overview.progress {
        println!(
            "Progress: {}% ({} of {} days, {} remaining, ends {})",
            progress.percent_complete,
            progress.elapsed_days,
            progress.total_days,
            progress.remaining_days,
            progress.end_date
        );
    }

    let plans = plan_db::list_plans_for_student(pool, student).await?;
    if plans.is_empty() {
        println!();
        println!("No plans found. Use `coachplan plan create` to start one.");
        return Ok(());
    }

    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    println!();
    println!("{:<36}  {:<name_w$}  {:<8}  {:<10}  END", "ID", "NAME", "STATUS", "START");
    for plan in &plans {
        println!(
            "{:<36}  {:<name_w$}  {:<8}  {:<10}  {}",
            plan.id,
            plan.name,
            plan.status.to_string(),
            plan.start_date.to_string(),
            plan.computed_end_date()
        );
    }

    Ok(())
}
