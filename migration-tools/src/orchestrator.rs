//! Grouped execution across one or many databases.
//!
//! The orchestrator is the only component that decides what runs where:
//! it validates the database filter, resolves pending sets through the
//! aggregator, drives the engine one migration at a time and builds the
//! reports. Every await is sequential; no two databases are ever touched
//! at the same time.

use log::{info, warn};

use crate::config::Settings;
use crate::connection::ConnectionHandler;
use crate::context::RunContext;
use crate::engine::MigrationEngine;
use crate::errors::{MigrationError, Result};
use crate::group::MigrationGroup;
use crate::migration::MigrationRecord;
use crate::pending::{DatabasePending, PendingMap, pending_for, resolve_all};
use crate::report::{DatabaseRun, GateOutcome, ListReport, RunReport};
use crate::topology::{DatabaseTarget, primary_targets};

pub struct Orchestrator<E: MigrationEngine> {
    engine: E,
    settings: Settings,
    connections: ConnectionHandler<E::Connection>,
}

impl<E: MigrationEngine> Orchestrator<E> {
    pub fn new(engine: E, settings: Settings) -> Self {
        let connections = match primary_targets(&settings.databases).first() {
            Some(target) => ConnectionHandler::with_default(&target.name),
            None => ConnectionHandler::new(),
        };
        Self {
            engine,
            settings,
            connections,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn connections(&self) -> &ConnectionHandler<E::Connection> {
        &self.connections
    }

    /// List pending migrations for the context's group filter.
    pub async fn list(&mut self, ctx: &mut RunContext) -> Result<ListReport> {
        let multi_database = ctx.is_multi_database(&self.settings.databases);
        let group = ctx.group();
        let pending = self.ensure_pending(ctx).await?;
        Ok(ListReport::from_pending(pending, group, multi_database))
    }

    /// Execute every pending migration of the context's group.
    ///
    /// Refuses to run without a group: an unfiltered batch would mix
    /// destructive `change` migrations with routine ones.
    pub async fn run_group(&mut self, ctx: &mut RunContext) -> Result<RunReport> {
        if ctx.group().is_none() {
            return Err(MigrationError::MissingGroup);
        }
        self.execute(ctx, None).await
    }

    /// Execute pending migrations up to and including `version`, or all of them.
    ///
    /// Honors the context's group filter when one is set.
    pub async fn migrate_up(&mut self, ctx: &mut RunContext, version: Option<u64>) -> Result<RunReport> {
        self.execute(ctx, version).await
    }

    /// Deployment gate: list `group` and fail when anything is pending.
    pub async fn abort_if_pending(&mut self, ctx: &mut RunContext, group: MigrationGroup) -> Result<GateOutcome> {
        ctx.set_group(Some(group));
        let listing = self.list(ctx).await?;
        let outcome = GateOutcome { group, listing };
        if outcome.listing.has_pending() {
            warn!(
                "{} pending {group} migration(s) block the deployment",
                outcome.listing.total_pending()
            );
        } else if outcome.listing.has_errors() {
            warn!("could not verify {group} migrations on {:?}", outcome.unverified());
        }
        Ok(outcome)
    }

    /// Targets this invocation works on, after the database filter.
    fn selected_targets(&self, ctx: &mut RunContext) -> Result<Vec<DatabaseTarget>> {
        let multi_database = ctx.is_multi_database(&self.settings.databases);
        let primaries = primary_targets(&self.settings.databases);
        let Some(first) = primaries.first() else {
            return Err(MigrationError::NoDatabases);
        };

        match ctx.database() {
            Some(name) => primaries
                .iter()
                .find(|target| target.name == name)
                .map(|target| vec![(*target).clone()])
                .ok_or_else(|| MigrationError::UnknownDatabase {
                    name: name.to_string(),
                    configured: primaries.iter().map(|target| target.name.clone()).collect(),
                }),
            None if multi_database => Ok(primaries.iter().map(|target| (*target).clone()).collect()),
            None => Ok(vec![(*first).clone()]),
        }
    }

    /// Resolve pending sets once per run and hand back the cached map.
    async fn ensure_pending<'c>(&mut self, ctx: &'c mut RunContext) -> Result<&'c mut PendingMap> {
        if !ctx.has_pending() {
            let targets = self.selected_targets(ctx)?;
            let group = ctx.group();

            let map = if ctx.is_multi_database(&self.settings.databases) {
                resolve_all(&self.engine, &mut self.connections, &targets, group).await
            } else {
                let mut map = PendingMap::new();
                for target in &targets {
                    // Single database: nothing to isolate, errors end the run.
                    let pending = pending_for(&self.engine, &mut self.connections, target, group).await?;
                    map.insert(DatabasePending::resolved(target.clone(), pending));
                }
                map
            };
            return Ok(ctx.store_pending(map));
        }
        Ok(ctx.pending_mut())
    }

    async fn execute(&mut self, ctx: &mut RunContext, up_to: Option<u64>) -> Result<RunReport> {
        let multi_database = ctx.is_multi_database(&self.settings.databases);
        let group = ctx.group();
        let pending = self.ensure_pending(ctx).await?;

        let mut report = RunReport::new(group, multi_database);
        for entry in pending.iter_mut() {
            let (run, failure) = self.execute_database(entry, up_to).await;
            report.databases.push(run);
            if let Some(err) = failure
                && !multi_database
            {
                return Err(MigrationError::Interrupted {
                    source: Box::new(err),
                    report: Box::new(report),
                });
            }
        }

        if !report.succeeded() {
            warn!(
                "{} of {} database(s) failed to migrate",
                report.failures().len(),
                report.databases.len()
            );
        }
        Ok(report)
    }

    /// Run one database's batch on its own connection.
    ///
    /// Applied migrations leave the pending set as soon as the engine
    /// reports success, so a failure midway keeps exactly the unapplied tail.
    async fn execute_database(
        &mut self,
        entry: &mut DatabasePending,
        up_to: Option<u64>,
    ) -> (DatabaseRun, Option<MigrationError>) {
        let mut run = DatabaseRun::new(entry.name());
        if let Some(err) = &entry.error {
            run.error = Some(err.to_string());
            return (run, None);
        }

        let batch: Vec<MigrationRecord> = entry
            .pending
            .iter()
            .filter(|migration| up_to.is_none_or(|version| migration.version <= version))
            .cloned()
            .collect();
        run.pending = batch.len();
        if batch.is_empty() {
            return (run, None);
        }

        let target = &entry.target;
        let mut scope = match self.connections.scope(&self.engine, target).await {
            Ok(scope) => scope,
            Err(err) => {
                run.error = Some(err.to_string());
                return (run, Some(err));
            }
        };

        let mut failure = None;
        for migration in &batch {
            if self.settings.forced && migration.group.is_none() {
                failure = Some(MigrationError::UngroupedMigration {
                    version: migration.version,
                    name: migration.name.clone(),
                });
                break;
            }

            info!("migrating {} {} on {}", migration.version, migration.name, target.name);
            match self.engine.run_migration(scope.connection(), target, migration).await {
                Ok(()) => {
                    entry.pending.remove(migration.version);
                    run.applied.push(migration.clone());
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if self.settings.dump_schema && !run.applied.is_empty() {
            match self.engine.dump_schema(scope.connection(), target).await {
                Ok(()) => run.schema_dumped = true,
                Err(err) if failure.is_none() => failure = Some(err),
                Err(err) => warn!("schema snapshot for {} failed: {err}", target.name),
            }
        }
        drop(scope);

        if let Some(err) = &failure {
            warn!("migrations for {} stopped: {err}", target.name);
            run.error = Some(err.to_string());
        }
        (run, failure)
    }
}
