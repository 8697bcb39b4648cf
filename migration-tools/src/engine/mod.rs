//! Migration engine seam.
//!
//! The orchestrator never touches a database directly. Discovery, the
//! applied-versions ledger and per-migration execution are delegated to a
//! [`MigrationEngine`]:
//! - `RedisEngine` - Lua migration files executed against Redis
//! - `MemoryEngine` - in-process engine for dry runs and tests

mod discovery;
pub mod ledger;
mod memory;
mod redis_engine;

use std::collections::BTreeSet;

use crate::errors::Result;
use crate::migration::MigrationRecord;
use crate::topology::DatabaseTarget;

pub use discovery::discover_migrations;
pub use ledger::{AppliedMigration, MigrationLedger, calculate_checksum};
pub use memory::{MemoryConnection, MemoryEngine};
pub use redis_engine::{RedisEngine, SchemaSnapshot};

/// Per-connection migration executor the orchestrator drives.
///
/// Implementations run one migration at a time; the orchestrator decides
/// which migrations run, in which order, and against which database.
#[allow(async_fn_in_trait)]
pub trait MigrationEngine {
    /// Connection to a single database.
    type Connection;

    /// Establish a connection for `target`.
    async fn connect(&self, target: &DatabaseTarget) -> Result<Self::Connection>;

    /// Every migration discoverable on the target's migrations path, ascending by version.
    fn migrations(&self, target: &DatabaseTarget) -> Result<Vec<MigrationRecord>>;

    /// Versions already recorded in the connection's ledger.
    async fn applied_versions(&self, conn: &mut Self::Connection) -> Result<BTreeSet<u64>>;

    /// Run exactly one migration and record it as applied.
    async fn run_migration(
        &self,
        conn: &mut Self::Connection,
        target: &DatabaseTarget,
        migration: &MigrationRecord,
    ) -> Result<()>;

    /// Regenerate the schema snapshot for `target`.
    async fn dump_schema(&self, conn: &mut Self::Connection, target: &DatabaseTarget) -> Result<()>;

    /// Discovered migrations minus the applied ledger.
    async fn pending_migrations(
        &self,
        conn: &mut Self::Connection,
        target: &DatabaseTarget,
    ) -> Result<Vec<MigrationRecord>> {
        let discovered = self.migrations(target)?;
        let applied = self.applied_versions(conn).await?;
        Ok(discovered
            .into_iter()
            .filter(|migration| !applied.contains(&migration.version))
            .collect())
    }
}
