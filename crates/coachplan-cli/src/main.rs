mod completion_cmds;
mod config;
mod day_cmds;
mod plan_cmds;
mod reminders_cmd;
mod resolve;
mod template_cmds;
mod week_cmd;

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use sqlx::PgPool;

use coachplan_core::engine::{EngineConfig, ScheduleEngine};
use coachplan_core::store::PgScheduleStore;
use coachplan_db::pool;

use config::{CliOverrides, CoachplanConfig};

#[derive(Parser)]
#[command(name = "coachplan", about = "Training plan authoring and weekly replication for coaches")]
pub struct Cli {
    /// Database URL (overrides COACHPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory of the local completion log (overrides COACHPLAN_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true, hide = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a coachplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/coachplan")]
        db_url: String,
        /// Directory of the local completion log
        #[arg(long)]
        state_dir: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the database
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Weekly schedule views
    Week {
        #[command(subcommand)]
        command: WeekCommands,
    },
    /// Workout templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Day schedules
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// Exercise completion
    Exercise {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
    /// Push every unsynced completion toggle again
    Sync,
    /// Record due expiry reminders and print the notices to deliver
    Reminders {
        /// Only show what is due without recording anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List entries of the local completion log
    Pending,
    /// Print a shell completion script
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Owner of a schedule: one student coached by one coach.
#[derive(clap::Args, Debug, Clone)]
pub struct Owner {
    /// Student ID
    #[arg(long)]
    pub student: String,
    /// Coach ID
    #[arg(long)]
    pub coach: String,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Start a new plan, ending the student's active plan if any
    Create {
        #[command(flatten)]
        owner: Owner,
        #[arg(long)]
        name: Option<String>,
        /// Plan length in weeks (default 4)
        #[arg(long)]
        weeks: Option<i32>,
        /// First day of the plan (default today)
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Renew an active plan starting today
    Renew {
        plan_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        weeks: Option<i32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// End an active plan
    End { plan_id: String },
    /// Show a student's plan status and history
    Status {
        #[arg(long)]
        student: String,
    },
    /// Copy the plan's base week into its remaining weeks
    Replicate {
        plan_id: String,
        /// First week offset to write (1 = the week after the base week)
        #[arg(long, default_value_t = 1)]
        resume_from: i32,
    },
}

#[derive(Subcommand)]
pub enum WeekCommands {
    /// Show the days of a week with grouped exercises and blocks
    Show {
        #[command(flatten)]
        owner: Owner,
        /// Any date in the week (default today)
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Create a template from a TOML file and write its ID back into the file
    Create {
        file: String,
        #[arg(long)]
        coach: String,
    },
    /// List a coach's templates
    List {
        #[arg(long)]
        coach: String,
    },
    /// Show a template (by ID or template file)
    Show { template: String },
    /// Export a template as TOML
    Export {
        template: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Delete a template; days created from it keep their content
    Delete { template: String },
    /// Instantiate a template onto a day slot
    Apply {
        template: String,
        #[command(flatten)]
        slot: Slot,
    },
}

/// A day slot of one owner's schedule.
#[derive(clap::Args, Debug, Clone)]
pub struct Slot {
    #[command(flatten)]
    pub owner: Owner,
    /// Any date in the target week
    #[arg(long)]
    pub week: NaiveDate,
    /// 1 = Monday ... 7 = Sunday
    #[arg(long)]
    pub weekday: i32,
    /// Session number within the day
    #[arg(long, default_value_t = 1)]
    pub session: i32,
}

#[derive(Subcommand)]
pub enum DayCommands {
    /// Copy a day's content onto another slot
    Copy {
        source_day: String,
        #[command(flatten)]
        slot: Slot,
    },
    /// Mark a day completed (or not, with --undo)
    Toggle {
        day_id: String,
        #[arg(long)]
        undo: bool,
    },
}

#[derive(Subcommand)]
pub enum ExerciseCommands {
    /// Mark an exercise completed (or not, with --undo)
    Toggle {
        exercise_id: String,
        #[arg(long)]
        undo: bool,
    },
}

/// Execute the `coachplan init` command: write config file.
fn cmd_init(db_url: &str, state_dir: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
        },
        sync: config::SyncSection {
            state_dir: state_dir.map(Into::into),
            ..Default::default()
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(dir) = state_dir {
        println!("  sync.state_dir = {dir}");
    }
    println!();
    println!("Next: run `coachplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `coachplan db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &CoachplanConfig) -> anyhow::Result<()> {
    println!("Initializing coachplan database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = async {
        pool::run_migrations(&db_pool).await?;
        let counts = pool::table_counts(&db_pool).await?;
        println!("Database ready. Tables:");
        for (table, count) in &counts {
            println!("  {table}: {count} rows");
        }
        anyhow::Ok(())
    }
    .await;
    db_pool.close().await;
    result?;

    println!("coachplan db-init complete.");
    Ok(())
}

/// Schedule engine over the Postgres store.
pub fn engine(pool: &PgPool, resolved: &CoachplanConfig) -> ScheduleEngine {
    ScheduleEngine::new(
        Arc::new(PgScheduleStore::new(pool.clone())),
        EngineConfig {
            call_timeout: resolved.reconcile.remote_timeout,
        },
    )
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());

    if let Commands::Init {
        db_url,
        state_dir,
        force,
    } = &cli.command
    {
        return cmd_init(db_url, state_dir.as_deref(), *force);
    }
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "coachplan", &mut std::io::stdout());
        return Ok(());
    }

    let resolved = CoachplanConfig::resolve(CliOverrides {
        database_url: cli.database_url.as_deref(),
        state_dir: cli.state_dir.as_deref(),
    })?;

    if let Commands::DbInit = cli.command {
        return cmd_db_init(&resolved).await;
    }

    let db_pool = pool::create_pool(&resolved.db_config)
        .await
        .context("is the database initialized? run `coachplan db-init`")?;

    let result = match cli.command {
        Commands::Plan { command } => plan_cmds::run_plan_command(command, &db_pool, &resolved, today).await,
        Commands::Week { command } => week_cmd::run_week_command(command, &db_pool, &resolved, today).await,
        Commands::Template { command } => template_cmds::run_template_command(command, &db_pool, &resolved).await,
        Commands::Day { command } => day_cmds::run_day_command(command, &db_pool, &resolved).await,
        Commands::Exercise { command } => completion_cmds::run_exercise_command(command, &db_pool, &resolved).await,
        Commands::Sync => completion_cmds::run_sync(&db_pool, &resolved).await,
        Commands::Pending => completion_cmds::run_pending(&resolved),
        Commands::Reminders { dry_run } => reminders_cmd::run_reminders(&db_pool, today, dry_run).await,
        Commands::Init { .. } | Commands::DbInit | Commands::Completions { .. } => Ok(()),
    };

    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
