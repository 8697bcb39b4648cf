//! Named operator tasks.
//!
//! The registry is built once per process: two generic tasks plus three
//! tasks per group. Deployment pipelines call these names directly.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::context::RunContext;
use crate::engine::MigrationEngine;
use crate::errors::Result;
use crate::group::MigrationGroup;
use crate::orchestrator::Orchestrator;
use crate::report::{GateOutcome, ListReport, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "group", rename_all = "snake_case")]
pub enum TaskAction {
    /// List pending migrations for the active group filter
    List,
    /// Run pending migrations for the active group
    RunActiveGroup,
    ListGroup(MigrationGroup),
    RunGroup(MigrationGroup),
    AbortIfPending(MigrationGroup),
}

impl TaskAction {
    /// Group the task pins, if any.
    pub fn group(&self) -> Option<MigrationGroup> {
        match *self {
            Self::List | Self::RunActiveGroup => None,
            Self::ListGroup(group) | Self::RunGroup(group) | Self::AbortIfPending(group) => Some(group),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub action: TaskAction,
}

/// What a task produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutcome {
    Listed(ListReport),
    Ran(RunReport),
    Gate(GateOutcome),
}

impl TaskOutcome {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Listed(report) => report.lines(),
            Self::Ran(report) => report.lines(),
            Self::Gate(outcome) => outcome.lines(),
        }
    }
}

impl Task {
    fn new(name: impl Into<String>, description: impl Into<String>, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            action,
        }
    }

    /// Context for this task from raw `GROUP`/`DATABASE` input.
    ///
    /// Group-pinned tasks ignore the raw group instead of validating it.
    pub fn context(&self, raw_group: &str, database: Option<&str>) -> Result<RunContext> {
        match self.action.group() {
            Some(group) => Ok(RunContext::new(Some(group)).with_database(database)),
            None => RunContext::from_raw(raw_group, database),
        }
    }

    /// Run the task against `orchestrator`.
    ///
    /// Group-pinned tasks override the context's group filter.
    pub async fn invoke<E: MigrationEngine>(
        &self,
        orchestrator: &mut Orchestrator<E>,
        ctx: &mut RunContext,
    ) -> Result<TaskOutcome> {
        match self.action {
            TaskAction::List => Ok(TaskOutcome::Listed(orchestrator.list(ctx).await?)),
            TaskAction::RunActiveGroup => Ok(TaskOutcome::Ran(orchestrator.run_group(ctx).await?)),
            TaskAction::ListGroup(group) => {
                ctx.set_group(Some(group));
                Ok(TaskOutcome::Listed(orchestrator.list(ctx).await?))
            }
            TaskAction::RunGroup(group) => {
                ctx.set_group(Some(group));
                Ok(TaskOutcome::Ran(orchestrator.run_group(ctx).await?))
            }
            TaskAction::AbortIfPending(group) => {
                Ok(TaskOutcome::Gate(orchestrator.abort_if_pending(ctx, group).await?))
            }
        }
    }
}

static REGISTRY: Lazy<Vec<Task>> = Lazy::new(|| {
    let mut tasks = vec![
        Task::new("db:migrate:list", "Lists pending migrations", TaskAction::List),
        Task::new(
            "db:migrate:group",
            "Runs pending migrations for a given group",
            TaskAction::RunActiveGroup,
        ),
    ];

    for group in MigrationGroup::ALL {
        tasks.push(Task::new(
            format!("db:migrate:list:{group}"),
            format!("Lists the migrations for group {group}"),
            TaskAction::ListGroup(group),
        ));
        tasks.push(Task::new(
            format!("db:migrate:group:{group}"),
            format!("Executes the migrations for group {group}"),
            TaskAction::RunGroup(group),
        ));
        tasks.push(Task::new(
            format!("db:abort_if_pending_migrations:{group}"),
            format!("Raises an error if there are pending {group} migrations"),
            TaskAction::AbortIfPending(group),
        ));
    }
    tasks
});

/// Every registered task, generic tasks first.
pub fn registry() -> &'static [Task] {
    &REGISTRY
}

pub fn find_task(name: &str) -> Option<&'static Task> {
    REGISTRY.iter().find(|task| task.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_group() {
        assert_eq!(registry().len(), 2 + 3 * MigrationGroup::ALL.len());
        assert_eq!(registry()[0].name, "db:migrate:list");
        assert_eq!(registry()[1].name, "db:migrate:group");

        for group in MigrationGroup::ALL {
            assert!(find_task(&format!("db:migrate:list:{group}")).is_some());
            assert!(find_task(&format!("db:migrate:group:{group}")).is_some());
            let gate = find_task(&format!("db:abort_if_pending_migrations:{group}")).unwrap();
            assert_eq!(gate.action, TaskAction::AbortIfPending(group));
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            find_task("db:migrate:group:change").unwrap().description,
            "Executes the migrations for group change"
        );
        assert_eq!(
            find_task("db:abort_if_pending_migrations:before").unwrap().description,
            "Raises an error if there are pending before migrations"
        );
    }

    #[test]
    fn test_unknown_task() {
        assert!(find_task("db:migrate:group:drunk").is_none());
        assert!(find_task("db:migrate").is_none());
    }

    #[test]
    fn test_action_group() {
        assert_eq!(TaskAction::List.group(), None);
        assert_eq!(TaskAction::RunGroup(MigrationGroup::After).group(), Some(MigrationGroup::After));
    }
}
