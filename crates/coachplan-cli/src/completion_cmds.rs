//! Completion toggles through the local log, plus `sync` and `pending`.
//!
//! A toggle is always recorded locally first. When the database write fails
//! the command still succeeds and `coachplan sync` pushes it later.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;

use coachplan_core::completion::{
    CompletionTarget, CompletionTracker, LocalCompletionLog, SyncState, ToggleOutcome,
};
use coachplan_core::store::PgScheduleStore;

use crate::ExerciseCommands;
use crate::config::CoachplanConfig;
use crate::resolve::parse_id;

fn tracker(pool: &PgPool, resolved: &CoachplanConfig) -> Result<CompletionTracker> {
    let log = LocalCompletionLog::open(&resolved.state_dir)?;
    Ok(CompletionTracker::new(
        Arc::new(PgScheduleStore::new(pool.clone())),
        log,
        resolved.reconcile.clone(),
    ))
}

pub async fn run_exercise_command(command: ExerciseCommands, pool: &PgPool, resolved: &CoachplanConfig) -> Result<()> {
    match command {
        ExerciseCommands::Toggle { exercise_id, undo } => {
            let id = parse_id("exercise", &exercise_id)?;
            toggle(pool, resolved, CompletionTarget::Exercise(id), !undo).await
        }
    }
}

pub async fn toggle(pool: &PgPool, resolved: &CoachplanConfig, target: CompletionTarget, completed: bool) -> Result<()> {
    let tracker = tracker(pool, resolved)?;
    let state = if completed { "completed" } else { "not completed" };

    match tracker.toggle(target, completed, Utc::now()).await? {
        ToggleOutcome::Synced => println!("Marked {target} {state}."),
        ToggleOutcome::Deferred { error } => {
            println!("Marked {target} {state} locally; the database update failed:");
            println!("  {error}");
            println!("Run `coachplan sync` to retry.");
        }
        ToggleOutcome::Missing => anyhow::bail!("{target} not found"),
    }
    Ok(())
}

pub async fn run_sync(pool: &PgPool, resolved: &CoachplanConfig) -> Result<()> {
    let summary = tracker(pool, resolved)?.retry_pending().await?;
    if summary.attempted == 0 {
        println!("Nothing to sync.");
        return Ok(());
    }

    println!(
        "Synced {} of {} pending toggle(s); {} failed, {} dropped (target deleted).",
        summary.synced, summary.attempted, summary.failed, summary.missing
    );
    if summary.failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}

pub fn run_pending(resolved: &CoachplanConfig) -> Result<()> {
    let log = LocalCompletionLog::open(&resolved.state_dir)?;
    println!("Completion log: {}", log.path().display());
    if log.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for entry in log.entries() {
        let state = match entry.state {
            SyncState::Unsynced => "unsynced",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::UnsyncedAfterFailure => "failed",
        };
        println!(
            "  {:<8}  {}  completed={}  attempts={}  recorded {}",
            state,
            entry.target,
            entry.completed,
            entry.attempts,
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(error) = &entry.last_error {
            println!("            last error: {error}");
        }
    }
    Ok(())
}
