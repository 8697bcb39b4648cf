//! Migration records, group metadata, and pending sets.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::errors::Result;
use crate::group::MigrationGroup;

/// Matches a `-- group: <name>` annotation in the leading comment block of a migration.
static GROUP_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--\s*group\s*:\s*(\S*)\s*$").expect("group annotation regex is valid"));

/// One discoverable migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Ordering key and idempotency key against the applied-versions ledger
    pub version: u64,
    /// Human-readable name
    pub name: String,
    /// Assigned group, `None` when ungrouped
    pub group: Option<MigrationGroup>,
    /// File the migration was discovered in, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl MigrationRecord {
    pub fn new(version: u64, name: impl Into<String>, group: Option<MigrationGroup>) -> Self {
        Self {
            version,
            name: name.into(),
            group,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether this migration belongs to the given filter (`None` matches everything).
    pub fn matches(&self, filter: Option<MigrationGroup>) -> bool {
        match filter {
            None => true,
            Some(group) => self.group == Some(group),
        }
    }
}

/// Read the group a migration declares in its leading comment block.
///
/// Only the comment lines at the top of the file are inspected; the first
/// non-comment line ends the header. Declaring a group outside the closed set
/// is rejected.
pub fn group_from_source(source: &str) -> Result<Option<MigrationGroup>> {
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with("--") {
            break;
        }
        if let Some(captures) = GROUP_ANNOTATION.captures(line) {
            return crate::group::resolve_group(&captures[1]);
        }
    }
    Ok(None)
}

/// Filter migrations by group, preserving relative order.
pub fn filter_for_group(records: Vec<MigrationRecord>, group: Option<MigrationGroup>) -> Vec<MigrationRecord> {
    records.into_iter().filter(|record| record.matches(group)).collect()
}

/// Migrations not yet applied to one database, ascending by version.
///
/// Membership only ever shrinks: executed migrations are removed as soon as
/// the engine reports success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PendingSet {
    records: Vec<MigrationRecord>,
}

impl PendingSet {
    pub fn new(mut records: Vec<MigrationRecord>) -> Self {
        records.sort_by_key(|record| record.version);
        records.dedup_by_key(|record| record.version);
        Self { records }
    }

    /// Narrow the set to a group filter.
    pub fn filtered(self, group: Option<MigrationGroup>) -> Self {
        Self {
            records: filter_for_group(self.records, group),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn versions(&self) -> Vec<u64> {
        self.records.iter().map(|record| record.version).collect()
    }

    /// Lowest pending version, the next one to execute.
    pub fn first(&self) -> Option<&MigrationRecord> {
        self.records.first()
    }

    /// Drop a migration once it has been applied.
    pub fn remove(&mut self, version: u64) -> Option<MigrationRecord> {
        let index = self.records.iter().position(|record| record.version == version)?;
        Some(self.records.remove(index))
    }
}

impl<'a> IntoIterator for &'a PendingSet {
    type Item = &'a MigrationRecord;
    type IntoIter = std::slice::Iter<'a, MigrationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
