//! `coachplan week show`: print one week of a student's schedule.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use coachplan_core::grouping::ExerciseEntry;
use coachplan_core::store::DayView;
use coachplan_core::week::WeekKey;
use coachplan_db::models::{Exercise, WorkoutBlock};

use crate::WeekCommands;
use crate::config::CoachplanConfig;

pub async fn run_week_command(
    command: WeekCommands,
    pool: &PgPool,
    resolved: &CoachplanConfig,
    today: NaiveDate,
) -> Result<()> {
    match command {
        WeekCommands::Show { owner, week, json } => {
            let week = WeekKey::containing(week.unwrap_or(today));
            let days = crate::engine(pool, resolved)
                .load_week(&owner.student, &owner.coach, week)
                .await?;

            if json {
                let out = serde_json::to_string_pretty(&days).context("failed to serialize week")?;
                println!("{out}");
                return Ok(());
            }

            let marker = if week.is_current(today) { " (current)" } else { "" };
            println!("Week of {week}{marker} for {}", owner.student);
            if days.is_empty() {
                println!();
                println!("No sessions scheduled.");
            }
            for view in &days {
                print_day(week, view);
            }
            Ok(())
        }
    }
}

fn print_day(week: WeekKey, view: &DayView) {
    let day = &view.day;
    let date = week
        .date_of(day.weekday)
        .map(|d| d.format("%a %Y-%m-%d").to_string())
        .unwrap_or_else(|| format!("weekday {}", day.weekday));

    println!();
    println!(
        "{} {date} #{} {}",
        check(day.completed),
        day.order_in_day,
        day.name.as_deref().unwrap_or("(untitled)")
    );
    println!("    ID: {}", day.id);
    if let Some(description) = &day.description {
        println!("    {description}");
    }

    for block in &view.blocks.start {
        print_block(block);
    }
    for entry in &view.entries {
        match entry {
            ExerciseEntry::Single(ex) => print_exercise("    ", ex),
            ExerciseEntry::Group(group) => {
                let rest = group
                    .rest_seconds
                    .map(|s| format!(", rest {s}s"))
                    .unwrap_or_default();
                println!("    {} ({} exercises{rest})", group.group_type, group.members.len());
                for ex in &group.members {
                    print_exercise("      ", ex);
                }
            }
        }
    }
    for block in view.blocks.middle.iter().chain(&view.blocks.end) {
        print_block(block);
    }
}

fn print_exercise(indent: &str, ex: &Exercise) {
    let load = ex.load.as_deref().map(|l| format!(" @ {l}")).unwrap_or_default();
    println!(
        "{indent}{} {}. {} {}x{}{load}  [{}]",
        check(ex.completed),
        ex.order,
        ex.name,
        ex.sets,
        ex.reps,
        ex.id
    );
}

fn print_block(block: &WorkoutBlock) {
    let minutes = block
        .estimated_minutes
        .map(|m| format!(" ~{m} min"))
        .unwrap_or_default();
    println!(
        "    {} [{} {}] {}{minutes}",
        check(block.completed),
        block.position,
        block.block_type,
        block.name
    );
}

fn check(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}
