//! In-process migration engine.
//!
//! Keeps migrations and ledgers in memory. Used for dry runs and as the
//! engine behind the orchestrator tests, so it can also simulate
//! unreachable databases and failing migrations.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::MigrationEngine;
use crate::errors::{MigrationError, Result};
use crate::migration::MigrationRecord;
use crate::topology::DatabaseTarget;

#[derive(Debug, Default)]
struct MemoryState {
    migrations: HashMap<PathBuf, Vec<MigrationRecord>>,
    applied: HashMap<String, BTreeSet<u64>>,
    unreachable: HashSet<String>,
    failing: HashSet<(String, u64)>,
    executed: Vec<(String, u64)>,
    connections: Vec<String>,
    schema_dumps: Vec<String>,
}

/// Engine whose migrations and ledgers live in memory.
///
/// Cloning shares the underlying state, so a caller can keep a handle for
/// inspection after handing the engine to an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<MemoryState>>,
}

/// Connection to one in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    database: String,
}

impl MemoryConnection {
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register migrations discoverable under a migrations path.
    pub fn with_migrations(self, path: impl Into<PathBuf>, migrations: Vec<MigrationRecord>) -> Self {
        self.add_migrations(path, migrations);
        self
    }

    pub fn add_migrations(&self, path: impl Into<PathBuf>, migrations: Vec<MigrationRecord>) {
        self.state()
            .migrations
            .entry(path.into())
            .or_default()
            .extend(migrations);
    }

    /// Record a version as already applied on `database`.
    pub fn mark_applied(&self, database: &str, version: u64) {
        self.state()
            .applied
            .entry(database.to_string())
            .or_default()
            .insert(version);
    }

    /// Make every connection attempt to `database` fail.
    pub fn fail_connection(&self, database: &str) {
        self.state().unreachable.insert(database.to_string());
    }

    /// Make running `version` on `database` fail.
    pub fn fail_migration(&self, database: &str, version: u64) {
        self.state().failing.insert((database.to_string(), version));
    }

    /// Applied versions of `database`, ascending.
    pub fn applied(&self, database: &str) -> Vec<u64> {
        self.state()
            .applied
            .get(database)
            .map(|versions| versions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every migration executed so far, in execution order.
    pub fn executed(&self) -> Vec<(String, u64)> {
        self.state().executed.clone()
    }

    /// Databases a connection was opened for, in order.
    pub fn connections_opened(&self) -> Vec<String> {
        self.state().connections.clone()
    }

    /// Databases whose schema snapshot was regenerated, in order.
    pub fn schema_dumps(&self) -> Vec<String> {
        self.state().schema_dumps.clone()
    }
}

impl MigrationEngine for MemoryEngine {
    type Connection = MemoryConnection;

    async fn connect(&self, target: &DatabaseTarget) -> Result<MemoryConnection> {
        let mut state = self.state();
        if state.unreachable.contains(&target.name) {
            return Err(MigrationError::connection(&target.name, "database is unreachable"));
        }
        state.connections.push(target.name.clone());
        Ok(MemoryConnection {
            database: target.name.clone(),
        })
    }

    fn migrations(&self, target: &DatabaseTarget) -> Result<Vec<MigrationRecord>> {
        let mut migrations = self
            .state()
            .migrations
            .get(target.migrations_path())
            .cloned()
            .unwrap_or_default();
        migrations.sort_by_key(|migration| migration.version);
        Ok(migrations)
    }

    async fn applied_versions(&self, conn: &mut MemoryConnection) -> Result<BTreeSet<u64>> {
        Ok(self
            .state()
            .applied
            .get(&conn.database)
            .cloned()
            .unwrap_or_default())
    }

    async fn run_migration(
        &self,
        conn: &mut MemoryConnection,
        _target: &DatabaseTarget,
        migration: &MigrationRecord,
    ) -> Result<()> {
        let mut state = self.state();
        if state.failing.contains(&(conn.database.clone(), migration.version)) {
            return Err(MigrationError::execution(
                &conn.database,
                migration.version,
                format!("{} raised", migration.name),
            ));
        }

        let newly_applied = state
            .applied
            .entry(conn.database.clone())
            .or_default()
            .insert(migration.version);
        if newly_applied {
            state.executed.push((conn.database.clone(), migration.version));
        }
        Ok(())
    }

    async fn dump_schema(&self, conn: &mut MemoryConnection, _target: &DatabaseTarget) -> Result<()> {
        self.state().schema_dumps.push(conn.database.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MigrationGroup;

    fn target() -> DatabaseTarget {
        DatabaseTarget::new("primary", "memory://")
    }

    fn engine() -> MemoryEngine {
        MemoryEngine::new().with_migrations(
            "db/migrate",
            vec![
                MigrationRecord::new(2, "Delta", Some(MigrationGroup::Change)),
                MigrationRecord::new(0, "Alpha", Some(MigrationGroup::Before)),
                MigrationRecord::new(1, "Beta", Some(MigrationGroup::Before)),
            ],
        )
    }

    #[tokio::test]
    async fn test_pending_excludes_applied_versions() {
        let engine = engine();
        engine.mark_applied("primary", 1);
        let mut conn = engine.connect(&target()).await.unwrap();

        let pending = engine.pending_migrations(&mut conn, &target()).await.unwrap();
        let versions: Vec<_> = pending.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_running_an_applied_migration_is_a_no_op() {
        let engine = engine();
        let mut conn = engine.connect(&target()).await.unwrap();
        let alpha = MigrationRecord::new(0, "Alpha", Some(MigrationGroup::Before));

        engine.run_migration(&mut conn, &target(), &alpha).await.unwrap();
        engine.run_migration(&mut conn, &target(), &alpha).await.unwrap();

        assert_eq!(engine.executed(), vec![("primary".to_string(), 0)]);
        assert_eq!(engine.applied("primary"), vec![0]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let engine = engine();
        engine.fail_migration("primary", 2);
        let mut conn = engine.connect(&target()).await.unwrap();
        let delta = MigrationRecord::new(2, "Delta", Some(MigrationGroup::Change));

        let err = engine.run_migration(&mut conn, &target(), &delta).await.unwrap_err();
        assert!(matches!(err, MigrationError::Execution { version: 2, .. }));
        assert!(engine.applied("primary").is_empty());

        engine.fail_connection("primary");
        assert!(engine.connect(&target()).await.is_err());
    }
}
