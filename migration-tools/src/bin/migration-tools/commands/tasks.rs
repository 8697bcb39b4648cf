use std::path::Path;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Table};
use serde::Serialize;

use migration_tools::{MigrationError, Task, TaskOutcome, find_task, registry};

use super::{FilterArgs, interrupted, load_project, redis_orchestrator};
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, add_table_header, create_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Run a Named Task",
    commands: &[
        "migration-tools task db:migrate:list",
        "migration-tools task db:migrate:group:before",
        "migration-tools task db:abort_if_pending_migrations:change",
        "GROUP=after migration-tools task db:migrate:group",
    ],
}];

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task name, see `migration-tools tasks`
    pub name: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Registered tasks as displayed by `tasks`.
#[derive(Serialize)]
#[serde(transparent)]
pub struct TaskList(&'static [Task]);

impl TableDisplay for TaskList {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = create_table(options);
        add_table_header(options, &mut table, &["Task", "Description"]);
        for task in self.0 {
            table.add_row(vec![Cell::new(&task.name), Cell::new(&task.description)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|task| task.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn handle_tasks(output: &OutputManager) -> Result<()> {
    output.display(&TaskList(registry()))
}

pub async fn handle_task(args: TaskArgs, config: Option<&Path>, output: &OutputManager) -> Result<()> {
    let Some(task) = find_task(&args.name) else {
        output.info("Run 'migration-tools tasks' to see every task.");
        anyhow::bail!("Unknown task '{}'", args.name);
    };

    let mut ctx = task.context(&args.filter.group, args.filter.database.as_deref())?;
    let project = load_project(config, output)?;
    let mut orchestrator = redis_orchestrator(&project)?;
    output.verbose(&format!("Running {}", task.name));

    let outcome = match task.invoke(&mut orchestrator, &mut ctx).await {
        Ok(outcome) => outcome,
        Err(MigrationError::MissingGroup) => {
            output.warning(&MigrationError::MissingGroup.to_string());
            return Ok(());
        }
        Err(err) => return interrupted(err, output),
    };
    output.report(&outcome)?;

    match outcome {
        TaskOutcome::Gate(gate) => {
            gate.into_result()?;
        }
        TaskOutcome::Ran(report) if !report.succeeded() => {
            anyhow::bail!("{} database(s) failed to migrate", report.failures().len());
        }
        TaskOutcome::Listed(report) if report.has_errors() => {
            anyhow::bail!("Could not resolve pending migrations for every database");
        }
        TaskOutcome::Ran(_) | TaskOutcome::Listed(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_list_compact_names_every_task() {
        let compact = TaskList(registry()).to_compact();
        assert!(compact.starts_with("db:migrate:list db:migrate:group "));
        assert!(compact.contains("db:abort_if_pending_migrations:change"));
    }

    #[test]
    fn test_task_list_table() {
        let table = TaskList(registry()).to_table(&GlobalOptions {
            no_color: true,
            ..Default::default()
        });
        let rendered = table.to_string();
        assert!(rendered.contains("db:migrate:group:before"));
        assert!(rendered.contains("Executes the migrations for group before"));
    }
}
