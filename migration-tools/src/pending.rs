//! Pending-migration resolution per database and across databases.

use log::{debug, warn};

use crate::connection::ConnectionHandler;
use crate::engine::MigrationEngine;
use crate::errors::{MigrationError, Result};
use crate::group::MigrationGroup;
use crate::migration::PendingSet;
use crate::topology::DatabaseTarget;

/// Pending migrations of one database, or why they could not be resolved.
#[derive(Debug)]
pub struct DatabasePending {
    pub target: DatabaseTarget,
    pub pending: PendingSet,
    pub error: Option<MigrationError>,
}

impl DatabasePending {
    pub fn resolved(target: DatabaseTarget, pending: PendingSet) -> Self {
        Self {
            target,
            pending,
            error: None,
        }
    }

    pub fn failed(target: DatabaseTarget, error: MigrationError) -> Self {
        Self {
            target,
            pending: PendingSet::default(),
            error: Some(error),
        }
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }
}

/// Pending sets keyed by database name, in configuration order.
#[derive(Debug, Default)]
pub struct PendingMap {
    entries: Vec<DatabasePending>,
}

impl PendingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any previous entry for the same database.
    pub fn insert(&mut self, entry: DatabasePending) {
        match self.entries.iter_mut().find(|existing| existing.name() == entry.name()) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, database: &str) -> Option<&DatabasePending> {
        self.entries.iter().find(|entry| entry.name() == database)
    }

    pub fn get_mut(&mut self, database: &str) -> Option<&mut DatabasePending> {
        self.entries.iter_mut().find(|entry| entry.name() == database)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatabasePending> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, DatabasePending> {
        self.entries.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(DatabasePending::name).collect()
    }

    /// Total pending migrations across every resolved database.
    pub fn total_pending(&self) -> usize {
        self.entries.iter().map(|entry| entry.pending.len()).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|entry| entry.error.is_some())
    }
}

impl<'a> IntoIterator for &'a PendingMap {
    type Item = &'a DatabasePending;
    type IntoIter = std::slice::Iter<'a, DatabasePending>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Pending migrations of `target`, filtered by `group`.
///
/// The target's connection is the default only while the ledger is read.
pub async fn pending_for<E>(
    engine: &E,
    connections: &mut ConnectionHandler<E::Connection>,
    target: &DatabaseTarget,
    group: Option<MigrationGroup>,
) -> Result<PendingSet>
where
    E: MigrationEngine,
{
    let mut scope = connections.scope(engine, target).await?;
    let pending = engine.pending_migrations(scope.connection(), target).await?;
    let pending = PendingSet::new(pending).filtered(group);
    debug!("{} pending migration(s) for {}", pending.len(), target.name);
    Ok(pending)
}

/// Resolve pending migrations for every target, in order.
///
/// A database that cannot be resolved is recorded with its error and the
/// remaining databases are still resolved.
pub async fn resolve_all<'t, E, I>(
    engine: &E,
    connections: &mut ConnectionHandler<E::Connection>,
    targets: I,
    group: Option<MigrationGroup>,
) -> PendingMap
where
    E: MigrationEngine,
    I: IntoIterator<Item = &'t DatabaseTarget>,
{
    let mut map = PendingMap::new();
    for target in targets {
        let entry = match pending_for(engine, connections, target, group).await {
            Ok(pending) => DatabasePending::resolved(target.clone(), pending),
            Err(err) => {
                warn!("could not resolve pending migrations for {}: {err}", target.name);
                DatabasePending::failed(target.clone(), err)
            }
        };
        map.insert(entry);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::migration::MigrationRecord;
    use crate::group::MigrationGroup::*;

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_migrations(
                "db/migrate",
                vec![
                    MigrationRecord::new(0, "Alpha", Some(Before)),
                    MigrationRecord::new(1, "Beta", Some(Before)),
                    MigrationRecord::new(2, "Delta", Some(Change)),
                    MigrationRecord::new(3, "Kappa", None),
                    MigrationRecord::new(4, "Zeta", Some(After)),
                ],
            )
            .with_migrations(
                "db/secondary_migrate",
                vec![MigrationRecord::new(7, "Omega", Some(Before))],
            )
    }

    fn primary() -> DatabaseTarget {
        DatabaseTarget::new("primary", "memory://")
    }

    fn secondary() -> DatabaseTarget {
        DatabaseTarget::new("secondary", "memory://").with_migrations_path("db/secondary_migrate")
    }

    #[tokio::test]
    async fn test_pending_for_filters_by_group() {
        let engine = engine();
        let mut connections = ConnectionHandler::with_default("primary");

        let pending = pending_for(&engine, &mut connections, &primary(), Some(Before))
            .await
            .unwrap();
        assert_eq!(pending.versions(), vec![0, 1]);

        let pending = pending_for(&engine, &mut connections, &primary(), None).await.unwrap();
        assert_eq!(pending.versions(), vec![0, 1, 2, 3, 4]);

        assert_eq!(connections.current(), Some("primary"));
        assert_eq!(engine.connections_opened(), vec!["primary".to_string()]);
    }

    #[tokio::test]
    async fn test_pending_for_skips_applied() {
        let engine = engine();
        engine.mark_applied("primary", 0);
        let mut connections = ConnectionHandler::new();

        let pending = pending_for(&engine, &mut connections, &primary(), Some(Before))
            .await
            .unwrap();
        assert_eq!(pending.versions(), vec![1]);
    }

    #[tokio::test]
    async fn test_resolve_all_keeps_order_and_restores_default() {
        let engine = engine();
        engine.mark_applied("secondary", 7);
        let mut connections = ConnectionHandler::with_default("primary");
        let targets = [primary(), secondary()];

        let map = resolve_all(&engine, &mut connections, &targets, Some(Before)).await;
        assert_eq!(map.names(), vec!["primary", "secondary"]);
        assert_eq!(map.get("primary").unwrap().pending.len(), 2);
        assert!(map.get("secondary").unwrap().pending.is_empty());
        assert_eq!(map.total_pending(), 2);
        assert_eq!(connections.current(), Some("primary"));
    }

    #[tokio::test]
    async fn test_resolve_all_isolates_unreachable_database() {
        let engine = engine();
        engine.fail_connection("primary");
        let mut connections = ConnectionHandler::with_default("primary");
        let targets = [primary(), secondary()];

        let map = resolve_all(&engine, &mut connections, &targets, None).await;
        assert!(map.has_errors());
        assert!(matches!(
            map.get("primary").unwrap().error,
            Some(MigrationError::Connection { .. })
        ));
        assert_eq!(map.get("secondary").unwrap().pending.versions(), vec![7]);
        assert_eq!(connections.current(), Some("primary"));
    }

    #[test]
    fn test_insert_replaces_same_database() {
        let mut map = PendingMap::new();
        map.insert(DatabasePending::resolved(primary(), PendingSet::default()));
        map.insert(DatabasePending::resolved(
            primary(),
            PendingSet::new(vec![MigrationRecord::new(1, "Beta", Some(Before))]),
        ));
        assert_eq!(map.len(), 1);
        assert_eq!(map.total_pending(), 1);
    }
}
