//! Applied-migrations ledger stored in Redis.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, Result};
use crate::group::MigrationGroup;

/// Hash suffix holding one record per applied version.
const LEDGER_SUFFIX: &str = "schema_migrations";

/// Applied migration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub version: u64,
    pub name: String,
    #[serde(default)]
    pub group: Option<MigrationGroup>,
    /// Migration checksum for validation
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Ledger of applied versions for one Redis database.
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    key: String,
}

impl MigrationLedger {
    pub fn new(namespace: &str) -> Self {
        Self {
            key: format!("{namespace}:{LEDGER_SUFFIX}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// List all applied migrations, ascending by version.
    pub async fn list_applied(&self, conn: &mut ConnectionManager) -> Result<Vec<AppliedMigration>> {
        let entries: HashMap<String, String> = conn.hgetall(&self.key).await?;

        let mut applied = entries
            .values()
            .map(|json| serde_json::from_str::<AppliedMigration>(json))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        applied.sort_by_key(|migration| migration.version);
        Ok(applied)
    }

    pub async fn applied_versions(&self, conn: &mut ConnectionManager) -> Result<BTreeSet<u64>> {
        let fields: Vec<String> = conn.hkeys(&self.key).await?;
        fields
            .iter()
            .map(|field| {
                field
                    .parse::<u64>()
                    .map_err(|_| MigrationError::Config(format!("corrupt ledger entry '{field}' in {}", self.key)))
            })
            .collect()
    }

    pub async fn is_applied(&self, conn: &mut ConnectionManager, version: u64) -> Result<bool> {
        Ok(conn.hexists(&self.key, version).await?)
    }

    /// Record a migration as applied.
    pub async fn record_applied(&self, conn: &mut ConnectionManager, migration: &AppliedMigration) -> Result<()> {
        let json = serde_json::to_string(migration)?;
        let _: () = conn.hset(&self.key, migration.version, json).await?;
        Ok(())
    }
}

/// Calculate a checksum for migration content.
pub fn calculate_checksum(content: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
