//! Redis-backed migration engine.
//!
//! Migrations are Lua scripts discovered on each database's migrations
//! path. Running a migration evaluates its script on the target connection
//! and then records it in the [`MigrationLedger`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use super::MigrationEngine;
use super::discovery::discover_migrations;
use super::ledger::{AppliedMigration, MigrationLedger, calculate_checksum};
use crate::errors::{MigrationError, Result};
use crate::migration::MigrationRecord;
use crate::topology::DatabaseTarget;

/// Snapshot of a database's ledger written after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub database: String,
    pub generated_at: DateTime<Utc>,
    pub applied: Vec<AppliedMigration>,
}

impl SchemaSnapshot {
    pub fn filename(database: &str) -> String {
        format!("{database}_schema.json")
    }
}

pub struct RedisEngine {
    ledger: MigrationLedger,
    schema_dir: PathBuf,
}

impl RedisEngine {
    pub fn new(namespace: &str, schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger: MigrationLedger::new(namespace),
            schema_dir: schema_dir.into(),
        }
    }

    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    fn source_of(&self, target: &DatabaseTarget, migration: &MigrationRecord) -> Result<PathBuf> {
        if let Some(source) = &migration.source {
            return Ok(source.clone());
        }
        discover_migrations(target.migrations_path())?
            .into_iter()
            .find(|candidate| candidate.version == migration.version)
            .and_then(|candidate| candidate.source)
            .ok_or_else(|| {
                MigrationError::execution(
                    &target.name,
                    migration.version,
                    format!("no migration file for version {}", migration.version),
                )
            })
    }
}

impl MigrationEngine for RedisEngine {
    type Connection = ConnectionManager;

    async fn connect(&self, target: &DatabaseTarget) -> Result<ConnectionManager> {
        let url = target.resolved_url()?;
        let client = redis::Client::open(url.as_str()).map_err(|err| MigrationError::connection(&target.name, err))?;
        ConnectionManager::new(client)
            .await
            .map_err(|err| MigrationError::connection(&target.name, err))
    }

    fn migrations(&self, target: &DatabaseTarget) -> Result<Vec<MigrationRecord>> {
        discover_migrations(target.migrations_path())
    }

    async fn applied_versions(&self, conn: &mut ConnectionManager) -> Result<BTreeSet<u64>> {
        self.ledger.applied_versions(conn).await
    }

    async fn run_migration(
        &self,
        conn: &mut ConnectionManager,
        target: &DatabaseTarget,
        migration: &MigrationRecord,
    ) -> Result<()> {
        if self.ledger.is_applied(conn, migration.version).await? {
            debug!("{} already applied on {}", migration.version, target.name);
            return Ok(());
        }

        let path = self.source_of(target, migration)?;
        let body = tokio::fs::read_to_string(&path).await?;
        let started = Instant::now();

        let script = redis::Script::new(&body);
        let _: redis::Value = script
            .invoke_async(conn)
            .await
            .map_err(|err| MigrationError::execution(&target.name, migration.version, err))?;

        let record = AppliedMigration {
            version: migration.version,
            name: migration.name.clone(),
            group: migration.group,
            checksum: calculate_checksum(&body),
            applied_at: Utc::now(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        self.ledger.record_applied(conn, &record).await?;

        info!(
            "applied {} {} on {} in {}ms",
            record.version, record.name, target.name, record.execution_time_ms
        );
        Ok(())
    }

    async fn dump_schema(&self, conn: &mut ConnectionManager, target: &DatabaseTarget) -> Result<()> {
        let snapshot = SchemaSnapshot {
            database: target.name.clone(),
            generated_at: Utc::now(),
            applied: self.ledger.list_applied(conn).await?,
        };

        tokio::fs::create_dir_all(&self.schema_dir).await?;
        let path = self.schema_dir.join(SchemaSnapshot::filename(&target.name));
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&path, json).await?;

        debug!("wrote schema snapshot {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MigrationGroup;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_filename() {
        assert_eq!(SchemaSnapshot::filename("primary"), "primary_schema.json");
    }

    #[test]
    fn test_source_of_prefers_discovered_path() {
        let engine = RedisEngine::new("migration_tools", "db");
        let target = DatabaseTarget::new("primary", "redis://127.0.0.1/");
        let migration = MigrationRecord::new(1, "init", None).with_source("/tmp/1_init.lua");

        assert_eq!(engine.source_of(&target, &migration).unwrap(), PathBuf::from("/tmp/1_init.lua"));
    }

    #[test]
    fn test_source_of_rediscovers_by_version() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("7_seed.lua"), "-- group: after\nreturn 1").unwrap();
        let engine = RedisEngine::new("migration_tools", "db");
        let target = DatabaseTarget::new("primary", "redis://127.0.0.1/").with_migrations_path(temp_dir.path());

        let migration = MigrationRecord::new(7, "seed", Some(MigrationGroup::After));
        assert_eq!(
            engine.source_of(&target, &migration).unwrap(),
            temp_dir.path().join("7_seed.lua")
        );

        let missing = MigrationRecord::new(8, "missing", None);
        assert!(matches!(
            engine.source_of(&target, &missing),
            Err(MigrationError::Execution { version: 8, .. })
        ));
    }
}
