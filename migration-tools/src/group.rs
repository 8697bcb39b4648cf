//! Migration groups and group validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, Result};

/// Execution phase a migration is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationGroup {
    Before,
    During,
    After,
    Change,
}

impl MigrationGroup {
    /// The closed set of recognized groups, in declaration order.
    pub const ALL: [MigrationGroup; 4] = [Self::Before, Self::During, Self::After, Self::Change];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::During => "during",
            Self::After => "after",
            Self::Change => "change",
        }
    }

    pub fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|g| g.as_str().to_string()).collect()
    }
}

impl fmt::Display for MigrationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationGroup {
    type Err = MigrationError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == raw)
            .ok_or_else(|| MigrationError::InvalidGroup {
                value: raw.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// Resolve a raw group filter.
///
/// An empty string means "no filter". Anything else must match a member of
/// [`MigrationGroup::ALL`] exactly (case-sensitive).
pub fn resolve_group(raw: &str) -> Result<Option<MigrationGroup>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some)
}

/// Human label used in listings, empty for ungrouped migrations.
pub fn group_label(group: Option<MigrationGroup>) -> &'static str {
    group.map(MigrationGroup::as_str).unwrap_or("")
}
