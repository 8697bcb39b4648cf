//! migration-tools core library.
//!
//! Grouped migration runner: migrations carry a group (`before`, `during`,
//! `after`, `change`) and are listed, executed and gated per group across
//! one or many databases.

pub mod config;
pub mod connection;
pub mod context;
pub mod engine;
pub mod errors;
pub mod group;
pub mod migration;
pub mod orchestrator;
pub mod pending;
pub mod report;
pub mod tasks;
pub mod topology;

pub use config::{ProjectContext, Settings, ToolConfig};
pub use connection::{ConnectionHandler, ScopedConnection};
pub use context::RunContext;
pub use engine::{MemoryEngine, MigrationEngine, RedisEngine};
pub use errors::*;
pub use group::{MigrationGroup, resolve_group};
pub use migration::{MigrationRecord, PendingSet};
pub use orchestrator::Orchestrator;
pub use pending::{DatabasePending, PendingMap};
pub use report::{GateOutcome, ListReport, RunReport};
pub use tasks::{Task, TaskAction, TaskOutcome, find_task, registry};
pub use topology::DatabaseTarget;

// Re-export redis types so users don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;

/// Delete all keys matching a pattern (for test cleanup).
///
/// This performs a SCAN + DEL operation to safely delete keys without blocking Redis.
pub async fn cleanup_pattern(conn: &mut ConnectionManager, pattern: &str) -> Result<u64> {
    const SCAN_COUNT: usize = 1000;
    let mut cursor: u64 = 0;
    let mut total_deleted: u64 = 0;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            let deleted: u64 = redis::cmd("DEL").arg(&keys).query_async(conn).await?;
            total_deleted += deleted;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    Ok(total_deleted)
}
