//! Database targets and single/multi-database detection.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{MigrationError, Result};

/// Conventional migrations location when a database does not override it.
pub const DEFAULT_MIGRATIONS_PATH: &str = "db/migrate";

/// Databases whose name ends with this suffix mirror a primary.
pub const REPLICA_SUFFIX: &str = "_replica";

/// One logical database the runner can migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseTarget {
    pub name: String,
    /// Connection URL, possibly a `${VAR}` reference
    pub url: String,
    pub migrations_path: PathBuf,
}

impl DatabaseTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            migrations_path: PathBuf::from(DEFAULT_MIGRATIONS_PATH),
        }
    }

    pub fn with_migrations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migrations_path = path.into();
        self
    }

    pub fn migrations_path(&self) -> &Path {
        &self.migrations_path
    }

    pub fn is_replica(&self) -> bool {
        self.name.ends_with(REPLICA_SUFFIX)
    }

    /// Connection URL with `${VAR}` references expanded.
    pub fn resolved_url(&self) -> Result<String> {
        expand_env(&self.url).map_err(|message| MigrationError::connection(&self.name, message))
    }
}

/// Expand a whole-value `${VAR}` reference from the process environment.
pub fn expand_env(raw: &str) -> std::result::Result<String, String> {
    if raw.starts_with("${") && raw.ends_with('}') {
        let var_name = &raw[2..raw.len() - 1];
        std::env::var(var_name).map_err(|_| format!("Environment variable {var_name} not set"))
    } else {
        Ok(raw.to_string())
    }
}

/// Targets that own migrations of their own, in configuration order.
pub fn primary_targets(targets: &[DatabaseTarget]) -> Vec<&DatabaseTarget> {
    targets.iter().filter(|target| !target.is_replica()).collect()
}

/// True when more than one non-replica database is configured.
pub fn is_multi_database(targets: &[DatabaseTarget]) -> bool {
    primary_targets(targets).len() > 1
}
