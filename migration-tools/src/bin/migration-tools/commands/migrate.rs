use std::path::Path;

use anyhow::Result;
use clap::Args;

use migration_tools::{MigrationError, MigrationGroup, RunContext};

use super::{FilterArgs, interrupted, load_project, redis_orchestrator};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const LIST_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "List Pending Migrations",
    commands: &[
        "migration-tools list                          # Every pending migration",
        "migration-tools list --group before           # Only the before group",
        "GROUP=after migration-tools list              # Group from the environment",
        "migration-tools list --database secondary     # One database only",
    ],
}];

pub const GROUP_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Run a Group",
    commands: &[
        "migration-tools group --group before          # Before deploying new code",
        "migration-tools group --group after           # Once the new code is live",
        "migration-tools group --group change --database primary",
    ],
}];

pub const GATE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Deployment Gate",
    commands: &[
        "migration-tools gate before                   # Exit 1 while before migrations are pending",
        "migration-tools gate change --output json",
    ],
}];

pub const UP_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Run Pending Migrations",
    commands: &[
        "migration-tools up                            # Everything pending, in version order",
        "migration-tools up --to 20240101120000        # Stop after this version",
    ],
}];

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct GateArgs {
    /// Group that must have no pending migrations
    pub group: String,

    /// Only check this database
    #[arg(short, long, env = "DATABASE")]
    pub database: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Run pending migrations up to and including this version
    #[arg(long = "to", value_name = "VERSION")]
    pub target_version: Option<u64>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub async fn handle_list(args: ListArgs, config: Option<&Path>, output: &OutputManager) -> Result<()> {
    let mut ctx = args.filter.run_context()?;
    let project = load_project(config, output)?;
    let mut orchestrator = redis_orchestrator(&project)?;

    let report = orchestrator.list(&mut ctx).await?;
    output.report(&report)?;

    if report.has_errors() {
        anyhow::bail!("Could not resolve pending migrations for every database");
    }
    Ok(())
}

pub async fn handle_group(args: GroupArgs, config: Option<&Path>, output: &OutputManager) -> Result<()> {
    let mut ctx = args.filter.run_context()?;
    if ctx.group().is_none() {
        return missing_group(output);
    }

    let project = load_project(config, output)?;
    let mut orchestrator = redis_orchestrator(&project)?;

    match orchestrator.run_group(&mut ctx).await {
        Ok(report) => {
            output.report(&report)?;
            if !report.succeeded() {
                anyhow::bail!("{} database(s) failed to migrate", report.failures().len());
            }
            Ok(())
        }
        Err(MigrationError::MissingGroup) => missing_group(output),
        Err(err) => interrupted(err, output),
    }
}

pub async fn handle_gate(args: GateArgs, config: Option<&Path>, output: &OutputManager) -> Result<()> {
    let group: MigrationGroup = args.group.parse()?;
    let mut ctx = RunContext::new(Some(group)).with_database(args.database.as_deref());

    let project = load_project(config, output)?;
    let mut orchestrator = redis_orchestrator(&project)?;

    let outcome = orchestrator.abort_if_pending(&mut ctx, group).await?;
    output.report(&outcome)?;
    if outcome.passed() {
        output.success(&format!("No pending {group} migrations"));
    }
    outcome.into_result()?;
    Ok(())
}

pub async fn handle_up(args: UpArgs, config: Option<&Path>, output: &OutputManager) -> Result<()> {
    let mut ctx = args.filter.run_context()?;
    let project = load_project(config, output)?;
    let mut orchestrator = redis_orchestrator(&project)?;

    let report = match orchestrator.migrate_up(&mut ctx, args.target_version).await {
        Ok(report) => report,
        Err(err) => return interrupted(err, output),
    };
    output.report(&report)?;
    if !report.succeeded() {
        anyhow::bail!("{} database(s) failed to migrate", report.failures().len());
    }
    Ok(())
}

/// Running every group at once is never allowed; explain and leave quietly.
fn missing_group(output: &OutputManager) -> Result<()> {
    output.warning(&MigrationError::MissingGroup.to_string());
    output.info(&format!(
        "Valid groups are {}. Set --group or GROUP.",
        MigrationGroup::valid_names().join(", ")
    ));
    Ok(())
}
