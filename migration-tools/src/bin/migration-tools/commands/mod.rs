pub mod migrate;
pub mod tasks;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use migration_tools::{MigrationError, Orchestrator, ProjectContext, RedisEngine, RunContext};

use crate::output::OutputManager;

/// Group and database filters shared by the migration commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Migration group (before, during, after, change)
    #[arg(short, long, env = "GROUP", default_value = "", hide_default_value = true)]
    pub group: String,

    /// Only work on this database
    #[arg(short, long, env = "DATABASE")]
    pub database: Option<String>,
}

impl FilterArgs {
    pub fn run_context(&self) -> Result<RunContext> {
        Ok(RunContext::from_raw(&self.group, self.database.as_deref())?)
    }
}

/// Load the project configuration, from `--config` or the nearest config file.
pub fn load_project(config: Option<&Path>, output: &OutputManager) -> Result<ProjectContext> {
    let project = match config {
        Some(path) => ProjectContext::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProjectContext::find().context("Failed to load project configuration")?,
    };

    match &project.config_path {
        Some(path) => output.verbose(&format!("Using config {}", path.display())),
        None => output.verbose("No config file found, assuming a single primary database"),
    }
    Ok(project)
}

/// Orchestrator backed by the Redis engine for every configured database.
pub fn redis_orchestrator(project: &ProjectContext) -> Result<Orchestrator<RedisEngine>> {
    let settings = project.settings()?;
    let engine = RedisEngine::new(project.namespace(), project.schema_dir());
    Ok(Orchestrator::new(engine, settings))
}

/// Show what an interrupted run applied, then fail with its error.
pub fn interrupted(err: MigrationError, output: &OutputManager) -> Result<()> {
    if let Some(report) = err.partial_report() {
        output.report(report)?;
    }
    Err(err.into())
}
