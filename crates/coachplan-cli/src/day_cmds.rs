//! CLI handlers for `coachplan day` subcommands.

use anyhow::Result;
use sqlx::PgPool;

use coachplan_core::completion::CompletionTarget;
use coachplan_core::engine::InstantiationSource;

use crate::DayCommands;
use crate::completion_cmds::toggle;
use crate::config::CoachplanConfig;
use crate::resolve::parse_id;
use crate::template_cmds::target;

pub async fn run_day_command(command: DayCommands, pool: &PgPool, resolved: &CoachplanConfig) -> Result<()> {
    match command {
        DayCommands::Copy { source_day, slot } => {
            let source = parse_id("day", &source_day)?;
            let outcome = crate::engine(pool, resolved)
                .instantiate(InstantiationSource::Day(source), &target(slot))
                .await?;
            println!(
                "Day {source} copied to {} (week {}, weekday {}, session {}).",
                outcome.day.id,
                outcome.day.week_start,
                outcome.day.weekday,
                outcome.day.order_in_day
            );
            println!("  Exercises:  {}", outcome.exercises.len());
            println!("  Blocks:     {}", outcome.blocks.len());
            Ok(())
        }
        DayCommands::Toggle { day_id, undo } => {
            let id = parse_id("day", &day_id)?;
            toggle(pool, resolved, CompletionTarget::Day(id), !undo).await
        }
    }
}
