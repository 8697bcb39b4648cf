use std::path::PathBuf;

use thiserror::Error;

use crate::report::RunReport;

/// Top-level error type returned by the migration orchestrator and its engines.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Requested group is not part of the closed group set.
    #[error("Invalid group \"{value}\" - valid groups are {valid:?}")]
    InvalidGroup { value: String, valid: Vec<String> },

    /// Group execution was requested without an active group.
    #[error("Please specify a migration group")]
    MissingGroup,

    /// A configured database could not be reached.
    #[error("could not connect to database '{database}': {message}")]
    Connection { database: String, message: String },

    /// The engine failed while running a single migration.
    #[error("migration {version} failed on database '{database}': {message}")]
    Execution {
        database: String,
        version: u64,
        message: String,
    },

    /// Deployment gate found pending migrations for a group.
    #[error("{pending} pending {group} migration(s). Run \"{command}\" to update your database then try again.")]
    GateFailure {
        group: String,
        pending: usize,
        command: String,
    },

    /// Deployment gate could not read the pending migrations of some databases.
    #[error("could not verify pending {group} migrations on {databases:?}")]
    GateUnverified { group: String, databases: Vec<String> },

    /// A single-database run stopped midway; `report` holds what was done before.
    #[error("{source}")]
    Interrupted {
        source: Box<MigrationError>,
        report: Box<RunReport>,
    },

    /// Forced mode refuses to run migrations without a group.
    #[error("Cowardly refusing to run ungrouped migration {version} ({name}) while forced mode is enabled")]
    UngroupedMigration { version: u64, name: String },

    /// The active database filter names a database that is not configured.
    #[error("unknown database '{name}' (configured: {configured:?})")]
    UnknownDatabase { name: String, configured: Vec<String> },

    /// No non-replica database is configured.
    #[error("no databases configured")]
    NoDatabases,

    /// Two migration files share a version number.
    #[error("duplicate migration version {version} in {path:?}")]
    DuplicateVersion { version: u64, path: PathBuf },

    /// A migration file could not be interpreted.
    #[error("invalid migration file {path:?}: {message}")]
    InvalidMigrationFile { path: PathBuf, message: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrationError {
    /// Convenience helper for wrapping an engine failure against one migration.
    pub fn execution(database: impl Into<String>, version: u64, message: impl ToString) -> Self {
        Self::Execution {
            database: database.into(),
            version,
            message: message.to_string(),
        }
    }

    pub fn connection(database: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            database: database.into(),
            message: message.to_string(),
        }
    }

    /// The error that stopped the run, looking through [`MigrationError::Interrupted`].
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            Self::Interrupted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Work completed before an interrupted run stopped.
    pub fn partial_report(&self) -> Option<&RunReport> {
        match self {
            Self::Interrupted { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_group_message_lists_valid_groups() {
        let err = MigrationError::InvalidGroup {
            value: "drunk".to_string(),
            valid: vec![
                "before".to_string(),
                "during".to_string(),
                "after".to_string(),
                "change".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            r#"Invalid group "drunk" - valid groups are ["before", "during", "after", "change"]"#
        );
    }

    #[test]
    fn test_execution_helper() {
        let err = MigrationError::execution("primary", 7, "boom");
        assert_eq!(err.to_string(), "migration 7 failed on database 'primary': boom");
        assert!(err.partial_report().is_none());
    }

    #[test]
    fn test_interrupted_displays_and_unwraps_cause() {
        let err = MigrationError::Interrupted {
            source: Box::new(MigrationError::execution("primary", 1, "boom")),
            report: Box::new(RunReport::new(None, false)),
        };
        assert_eq!(err.to_string(), "migration 1 failed on database 'primary': boom");
        assert!(matches!(err.root_cause(), MigrationError::Execution { version: 1, .. }));
        assert!(err.partial_report().is_some());
    }

    #[test]
    fn test_ungrouped_message() {
        let err = MigrationError::UngroupedMigration {
            version: 3,
            name: "Kappa".to_string(),
        };
        assert!(err.to_string().starts_with("Cowardly refusing"));
    }
}
