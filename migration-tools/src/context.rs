//! Per-invocation run state.

use crate::errors::Result;
use crate::group::{MigrationGroup, resolve_group};
use crate::pending::PendingMap;
use crate::topology::{DatabaseTarget, is_multi_database};

/// Environment key selecting the active group filter.
pub const GROUP_ENV: &str = "GROUP";
/// Environment key selecting the active database filter.
pub const DATABASE_ENV: &str = "DATABASE";

/// State for one task invocation.
///
/// Built fresh for every invocation and dropped afterwards. It caches the
/// topology decision and the resolved pending sets so the expensive
/// discovery and connection work happens at most once per run.
#[derive(Debug, Default)]
pub struct RunContext {
    group: Option<MigrationGroup>,
    database: Option<String>,
    multi_database: Option<bool>,
    pending: Option<PendingMap>,
}

impl RunContext {
    pub fn new(group: Option<MigrationGroup>) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    /// Build a context from raw operator input, validating the group first.
    ///
    /// Empty strings mean "no filter".
    pub fn from_raw(group: &str, database: Option<&str>) -> Result<Self> {
        let group = resolve_group(group)?;
        Ok(Self::new(group).with_database(database))
    }

    /// Build a context from the `GROUP` and `DATABASE` environment keys.
    pub fn from_env() -> Result<Self> {
        let group = std::env::var(GROUP_ENV).unwrap_or_default();
        let database = std::env::var(DATABASE_ENV).ok();
        Self::from_raw(&group, database.as_deref())
    }

    pub fn with_database(mut self, database: Option<&str>) -> Self {
        self.database = database.filter(|name| !name.is_empty()).map(str::to_string);
        self
    }

    pub fn group(&self) -> Option<MigrationGroup> {
        self.group
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Switch the active group and forget pending sets resolved for the old one.
    pub fn set_group(&mut self, group: Option<MigrationGroup>) {
        if self.group != group {
            self.pending = None;
        }
        self.group = group;
    }

    /// Topology of `targets`, decided on first use and then fixed for this run.
    pub fn is_multi_database(&mut self, targets: &[DatabaseTarget]) -> bool {
        *self
            .multi_database
            .get_or_insert_with(|| is_multi_database(targets))
    }

    /// Pending sets resolved so far in this run.
    pub fn pending(&self) -> Option<&PendingMap> {
        self.pending.as_ref()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn store_pending(&mut self, pending: PendingMap) -> &mut PendingMap {
        self.pending.insert(pending)
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingMap {
        self.pending.get_or_insert_with(PendingMap::default)
    }
}
