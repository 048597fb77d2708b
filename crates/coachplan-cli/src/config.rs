//! Configuration file management for coachplan.
//!
//! Provides a TOML-based config file at `~/.config/coachplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use coachplan_core::completion::ReconcileConfig;
use coachplan_db::config::DbConfig;

pub const STATE_DIR_ENV: &str = "COACHPLAN_STATE_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

/// Settings of the local completion log and its reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_grace_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_timeout_ms: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the coachplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/coachplan` or
/// `~/.config/coachplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("coachplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coachplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where the local completion log lives when nothing else is configured.
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coachplan")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The URL may carry a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct CoachplanConfig {
    pub db_config: DbConfig,
    pub state_dir: PathBuf,
    pub reconcile: ReconcileConfig,
}

/// Values given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliOverrides<'a> {
    pub database_url: Option<&'a str>,
    pub state_dir: Option<&'a str>,
}

impl CoachplanConfig {
    /// Resolve configuration from the process environment and the config
    /// file.
    pub fn resolve(cli: CliOverrides<'_>) -> Result<Self> {
        let file = match load_config() {
            Ok(file) => Some(file),
            Err(e) if config_path().exists() => return Err(e),
            Err(_) => None,
        };
        Ok(Self::resolve_with(cli, |name| std::env::var(name).ok(), file.as_ref()))
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `--database-url` > `COACHPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - State dir: `--state-dir` > `COACHPLAN_STATE_DIR` > `sync.state_dir` > platform data dir
    /// - Timings: `sync.*_ms` > [`ReconcileConfig::default`]
    pub fn resolve_with(
        cli: CliOverrides<'_>,
        env: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Self {
        let db_url = cli
            .database_url
            .map(str::to_owned)
            .or_else(|| env(DbConfig::ENV_VAR))
            .or_else(|| file.map(|f| f.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let sync = file.map(|f| f.sync.clone()).unwrap_or_default();
        let state_dir = cli
            .state_dir
            .map(PathBuf::from)
            .or_else(|| env(STATE_DIR_ENV).map(PathBuf::from))
            .or(sync.state_dir)
            .unwrap_or_else(default_state_dir);

        let defaults = ReconcileConfig::default();
        let reconcile = ReconcileConfig {
            resume_grace: sync
                .resume_grace_ms
                .map_or(defaults.resume_grace, Duration::from_millis),
            remote_timeout: sync
                .remote_timeout_ms
                .map_or(defaults.remote_timeout, Duration::from_millis),
        };

        Self {
            db_config: DbConfig::new(db_url),
            state_dir,
            reconcile,
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
