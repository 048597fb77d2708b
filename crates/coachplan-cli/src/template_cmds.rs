//! CLI handlers for `coachplan template` subcommands.

use anyhow::{Context, Result};
use sqlx::PgPool;

use coachplan_core::engine::{InstantiationSource, InstantiationTarget};
use coachplan_core::template::{
    create_template, delete_template, get_template_detail, list_templates, parse_template_toml,
    render_template_toml,
};
use coachplan_core::week::WeekKey;

use crate::config::CoachplanConfig;
use crate::resolve::{resolve_template_id, write_template_id_to_file};
use crate::{Slot, TemplateCommands};

pub async fn run_template_command(command: TemplateCommands, pool: &PgPool, resolved: &CoachplanConfig) -> Result<()> {
    match command {
        TemplateCommands::Create { file, coach } => cmd_create(pool, &file, &coach).await,
        TemplateCommands::List { coach } => cmd_list(pool, &coach).await,
        TemplateCommands::Show { template } => cmd_show(pool, &template).await,
        TemplateCommands::Export { template, output } => cmd_export(pool, &template, output.as_deref()).await,
        TemplateCommands::Delete { template } => {
            let id = resolve_template_id(&template)?;
            if delete_template(pool, id).await? {
                println!("Template {id} deleted.");
            } else {
                anyhow::bail!("template {id} not found");
            }
            Ok(())
        }
        TemplateCommands::Apply { template, slot } => cmd_apply(pool, resolved, &template, slot).await,
    }
}

/// Parse a template file, store it, and record the new ID in the file.
async fn cmd_create(pool: &PgPool, file: &str, coach: &str) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("failed to read template file: {file}"))?;
    let draft = parse_template_toml(&content).with_context(|| format!("failed to parse template file: {file}"))?;

    let template = create_template(pool, coach, &draft).await?;
    write_template_id_to_file(file, template.id)?;

    println!("Template created.");
    println!();
    println!("  Template ID:  {}", template.id);
    println!("  Name:         {}", template.name);
    println!("  Exercises:    {}", draft.exercises.len());
    println!("  Blocks:       {}", draft.blocks.len());
    println!();
    println!("The ID was written to {file}.");
    Ok(())
}

async fn cmd_list(pool: &PgPool, coach: &str) -> Result<()> {
    let templates = list_templates(pool, coach).await?;
    if templates.is_empty() {
        println!("No templates found. Use `coachplan template create <file>` to create one.");
        return Ok(());
    }

    let name_w = templates.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    println!("{:<36}  {:<name_w$}  CATEGORY", "ID", "NAME");
    for template in &templates {
        println!(
            "{:<36}  {:<name_w$}  {}",
            template.id,
            template.name,
            template.category.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_show(pool: &PgPool, input: &str) -> Result<()> {
    let detail = get_template_detail(pool, resolve_template_id(input)?).await?;
    let template = &detail.template;

    println!("Template: {}", template.name);
    println!("  ID:        {}", template.id);
    println!("  Coach:     {}", template.coach_id);
    if let Some(category) = &template.category {
        println!("  Category:  {category}");
    }
    if let Some(description) = &template.description {
        println!("  {description}");
    }

    if !detail.exercises.is_empty() {
        println!();
        println!("Exercises:");
        for ex in &detail.exercises {
            let group = match (&ex.group_id, ex.group_type) {
                (Some(id), Some(kind)) => format!("  [{kind} {id}]"),
                _ => String::new(),
            };
            println!("  {}. {} {}x{} rest {}s{group}", ex.order, ex.name, ex.sets, ex.reps, ex.rest_seconds);
        }
    }
    if !detail.blocks.is_empty() {
        println!();
        println!("Blocks:");
        for block in &detail.blocks {
            println!("  [{} {}] {}", block.position, block.block_type, block.name);
        }
    }
    Ok(())
}

async fn cmd_export(pool: &PgPool, input: &str, output: Option<&str>) -> Result<()> {
    let detail = get_template_detail(pool, resolve_template_id(input)?).await?;
    let toml_content = render_template_toml(&detail)?;

    match output {
        Some(path) => {
            std::fs::write(path, &toml_content).with_context(|| format!("failed to write to {path}"))?;
            println!("Template exported to {path}");
        }
        None => print!("{toml_content}"),
    }
    Ok(())
}

async fn cmd_apply(pool: &PgPool, resolved: &CoachplanConfig, input: &str, slot: Slot) -> Result<()> {
    let template_id = resolve_template_id(input)?;
    let outcome = crate::engine(pool, resolved)
        .instantiate(InstantiationSource::Template(template_id), &target(slot))
        .await?;

    println!(
        "Template applied to day {} (week {}, weekday {}, session {}).",
        outcome.day.id,
        outcome.day.week_start,
        outcome.day.weekday,
        outcome.day.order_in_day
    );
    println!("  Exercises:  {}", outcome.exercises.len());
    println!("  Blocks:     {}", outcome.blocks.len());
    Ok(())
}

pub fn target(slot: Slot) -> InstantiationTarget {
    InstantiationTarget {
        student_id: slot.owner.student,
        coach_id: slot.owner.coach,
        week: WeekKey::containing(slot.week),
        weekday: slot.weekday,
        order_in_day: slot.session,
    }
}
