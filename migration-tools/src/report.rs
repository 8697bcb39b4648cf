//! Operator-facing reports for listing, execution and the deployment gate.
//!
//! Reports are plain data: the orchestrator builds them and the binary
//! renders them, either through [`ListReport::lines`] and friends or as JSON.

use serde::Serialize;

use crate::errors::MigrationError;
use crate::group::{MigrationGroup, group_label};
use crate::migration::MigrationRecord;
use crate::pending::PendingMap;

/// Width the group label is truncated to in detail lines.
const LABEL_WIDTH: usize = 6;

/// Binary name used in remediation hints.
pub const TOOL_NAME: &str = "migration-tools";

/// One detail line: right-aligned version, centered group label, name.
pub fn detail_line(migration: &MigrationRecord) -> String {
    let label: String = group_label(migration.group).chars().take(LABEL_WIDTH).collect();
    format!("  {:>4} {:^6} {}", migration.version, label, migration.name)
}

/// Append ` for group "<group>"` when a group filter is active.
pub fn with_group_suffix(message: impl Into<String>, group: Option<MigrationGroup>) -> String {
    let mut message = message.into();
    if let Some(group) = group {
        message.push_str(&format!(" for group \"{group}\""));
    }
    message
}

/// Pending migrations of one database as listed.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseListing {
    pub database: String,
    pub pending: Vec<MigrationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub group: Option<MigrationGroup>,
    pub multi_database: bool,
    pub databases: Vec<DatabaseListing>,
}

impl ListReport {
    pub fn from_pending(pending: &PendingMap, group: Option<MigrationGroup>, multi_database: bool) -> Self {
        let databases = pending
            .iter()
            .map(|entry| DatabaseListing {
                database: entry.name().to_string(),
                pending: entry.pending.records().to_vec(),
                error: entry.error.as_ref().map(MigrationError::to_string),
            })
            .collect();
        Self {
            group,
            multi_database,
            databases,
        }
    }

    pub fn total_pending(&self) -> usize {
        self.databases.iter().map(|db| db.pending.len()).sum()
    }

    pub fn has_pending(&self) -> bool {
        self.total_pending() > 0
    }

    pub fn has_errors(&self) -> bool {
        self.databases.iter().any(|db| db.error.is_some())
    }

    pub fn lines(&self) -> Vec<String> {
        if self.multi_database {
            self.multi_database_lines()
        } else {
            self.single_database_lines()
        }
    }

    fn single_database_lines(&self) -> Vec<String> {
        let pending: Vec<&MigrationRecord> = self.databases.iter().flat_map(|db| &db.pending).collect();
        if pending.is_empty() {
            return vec![with_group_suffix("Your database schema is up to date", self.group)];
        }

        let mut lines = vec![with_group_suffix(
            format!("You have {} pending migrations", pending.len()),
            self.group,
        )];
        lines.extend(pending.into_iter().map(detail_line));
        lines
    }

    fn multi_database_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for db in &self.databases {
            if let Some(error) = &db.error {
                lines.push(format!("Could not resolve pending migrations for {}: {error}", db.database));
                continue;
            }
            if db.pending.is_empty() {
                continue;
            }
            lines.push(with_group_suffix(
                format!("You have {} pending migrations for {}", db.pending.len(), db.database),
                self.group,
            ));
            lines.extend(db.pending.iter().map(detail_line));
        }

        if lines.is_empty() {
            lines.push(with_group_suffix("Your databases schemas are up to date", self.group));
        }
        lines
    }
}

/// Outcome of running one database's batch.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseRun {
    pub database: String,
    /// Migrations pending when the batch started
    pub pending: usize,
    pub applied: Vec<MigrationRecord>,
    pub schema_dumped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseRun {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            pending: 0,
            applied: Vec::new(),
            schema_dumped: false,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn attempted(&self) -> bool {
        self.pending > 0 || self.error.is_some()
    }
}

/// Result of an execution across every selected database.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub group: Option<MigrationGroup>,
    pub multi_database: bool,
    pub databases: Vec<DatabaseRun>,
}

impl RunReport {
    pub fn new(group: Option<MigrationGroup>, multi_database: bool) -> Self {
        Self {
            group,
            multi_database,
            databases: Vec::new(),
        }
    }

    /// True when every database completed its batch.
    pub fn succeeded(&self) -> bool {
        self.databases.iter().all(DatabaseRun::succeeded)
    }

    pub fn applied_count(&self) -> usize {
        self.databases.iter().map(|db| db.applied.len()).sum()
    }

    pub fn failures(&self) -> Vec<&DatabaseRun> {
        self.databases.iter().filter(|db| !db.succeeded()).collect()
    }

    pub fn get(&self, database: &str) -> Option<&DatabaseRun> {
        self.databases.iter().find(|db| db.database == database)
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for db in self.databases.iter().filter(|db| db.attempted()) {
            // A database that failed to resolve never started a batch.
            if db.pending > 0 {
                lines.push(match self.group {
                    Some(group) => format!("Running {} migrations for {}", group.as_str().to_uppercase(), db.database),
                    None => format!("Running migrations for {}", db.database),
                });
                lines.extend(db.applied.iter().map(detail_line));
                if db.schema_dumped {
                    lines.push(format!("Regenerated schema snapshot for {}", db.database));
                }
            }
            if let Some(error) = &db.error {
                lines.push(format!("Failed to run migrations for {}: {error}", db.database));
            }
        }

        if lines.is_empty() {
            let message = if self.multi_database {
                "Your databases schemas are up to date"
            } else {
                "Your database schema is up to date"
            };
            lines.push(with_group_suffix(message, self.group));
        }
        lines
    }
}

/// Result of the deployment gate for one group.
#[derive(Debug, Clone, Serialize)]
pub struct GateOutcome {
    pub group: MigrationGroup,
    pub listing: ListReport,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        !self.listing.has_pending() && !self.listing.has_errors()
    }

    /// Command an operator runs to clear the gate.
    pub fn remediation_command(&self) -> String {
        format!("{TOOL_NAME} group --group {}", self.group)
    }

    pub fn abort_message(&self) -> String {
        format!(
            "Run \"{}\" to update your database then try again.",
            self.remediation_command()
        )
    }

    /// Listing lines, followed by the abort message while migrations are pending.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.listing.lines();
        if self.listing.has_pending() {
            lines.push(self.abort_message());
        }
        lines
    }

    /// Databases whose pending migrations could not be read.
    pub fn unverified(&self) -> Vec<String> {
        self.listing
            .databases
            .iter()
            .filter(|db| db.error.is_some())
            .map(|db| db.database.clone())
            .collect()
    }

    /// Pending migrations fail the gate first; unreadable databases fail it
    /// without a remediation hint.
    pub fn into_result(self) -> crate::errors::Result<Self> {
        if self.listing.has_pending() {
            return Err(MigrationError::GateFailure {
                group: self.group.to_string(),
                pending: self.listing.total_pending(),
                command: self.remediation_command(),
            });
        }
        if self.listing.has_errors() {
            return Err(MigrationError::GateUnverified {
                group: self.group.to_string(),
                databases: self.unverified(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MigrationGroup::*;

    fn listing(database: &str, pending: Vec<MigrationRecord>) -> DatabaseListing {
        DatabaseListing {
            database: database.to_string(),
            pending,
            error: None,
        }
    }

    #[test]
    fn test_detail_line_layout() {
        assert_eq!(
            detail_line(&MigrationRecord::new(0, "Alpha", Some(Before))),
            "     0 before Alpha"
        );
        assert_eq!(
            detail_line(&MigrationRecord::new(12, "Delta", Some(Change))),
            "    12 change Delta"
        );
        assert_eq!(detail_line(&MigrationRecord::new(3, "Kappa", None)), "     3        Kappa");
        assert_eq!(
            detail_line(&MigrationRecord::new(4, "Zeta", Some(After))),
            "     4 after  Zeta"
        );
        assert_eq!(
            detail_line(&MigrationRecord::new(20240101, "Big", Some(During))),
            "  20240101 during Big"
        );
    }

    #[test]
    fn test_single_database_listing() {
        let report = ListReport {
            group: Some(Before),
            multi_database: false,
            databases: vec![listing(
                "primary",
                vec![
                    MigrationRecord::new(0, "Alpha", Some(Before)),
                    MigrationRecord::new(1, "Beta", Some(Before)),
                ],
            )],
        };
        assert_eq!(
            report.lines(),
            vec![
                "You have 2 pending migrations for group \"before\"",
                "     0 before Alpha",
                "     1 before Beta",
            ]
        );

        let empty = ListReport {
            group: None,
            multi_database: false,
            databases: vec![listing("primary", Vec::new())],
        };
        assert_eq!(empty.lines(), vec!["Your database schema is up to date"]);
    }

    #[test]
    fn test_multi_database_listing_skips_up_to_date_databases() {
        let report = ListReport {
            group: None,
            multi_database: true,
            databases: vec![
                listing("primary", vec![MigrationRecord::new(1, "Beta", Some(Before))]),
                listing("secondary", Vec::new()),
            ],
        };
        assert_eq!(
            report.lines(),
            vec!["You have 1 pending migrations for primary", "     1 before Beta"]
        );

        let none = ListReport {
            group: Some(After),
            multi_database: true,
            databases: vec![listing("primary", Vec::new()), listing("secondary", Vec::new())],
        };
        assert_eq!(
            none.lines(),
            vec!["Your databases schemas are up to date for group \"after\""]
        );
    }

    #[test]
    fn test_run_report_lines() {
        let mut primary = DatabaseRun::new("primary");
        primary.pending = 2;
        primary.applied.push(MigrationRecord::new(0, "Alpha", Some(Before)));
        primary.schema_dumped = true;
        primary.error = Some("migration 1 failed on database 'primary': boom".to_string());

        let report = RunReport {
            group: Some(Before),
            multi_database: true,
            databases: vec![primary, DatabaseRun::new("secondary")],
        };
        assert!(!report.succeeded());
        assert_eq!(report.applied_count(), 1);
        assert_eq!(
            report.lines(),
            vec![
                "Running BEFORE migrations for primary",
                "     0 before Alpha",
                "Regenerated schema snapshot for primary",
                "Failed to run migrations for primary: migration 1 failed on database 'primary': boom",
            ]
        );
    }

    #[test]
    fn test_gate_outcome() {
        let passed = GateOutcome {
            group: Before,
            listing: ListReport {
                group: Some(Before),
                multi_database: false,
                databases: vec![listing("primary", Vec::new())],
            },
        };
        assert!(passed.passed());
        assert_eq!(
            passed.lines(),
            vec!["Your database schema is up to date for group \"before\""]
        );
        assert!(passed.into_result().is_ok());

        let failed = GateOutcome {
            group: Before,
            listing: ListReport {
                group: Some(Before),
                multi_database: false,
                databases: vec![listing("primary", vec![MigrationRecord::new(0, "Alpha", Some(Before))])],
            },
        };
        assert_eq!(
            failed.lines().last().unwrap(),
            "Run \"migration-tools group --group before\" to update your database then try again."
        );
        match failed.into_result() {
            Err(MigrationError::GateFailure { group, pending, command }) => {
                assert_eq!(group, "before");
                assert_eq!(pending, 1);
                assert_eq!(command, "migration-tools group --group before");
            }
            other => panic!("expected gate failure, got {other:?}"),
        }
    }

    #[test]
    fn test_gate_with_unreadable_database_has_no_remediation() {
        let mut secondary = listing("secondary", Vec::new());
        secondary.error = Some("could not connect to database 'secondary': refused".to_string());
        let outcome = GateOutcome {
            group: Before,
            listing: ListReport {
                group: Some(Before),
                multi_database: true,
                databases: vec![listing("primary", Vec::new()), secondary],
            },
        };

        assert!(!outcome.passed());
        assert_eq!(
            outcome.lines(),
            vec!["Could not resolve pending migrations for secondary: could not connect to database 'secondary': refused"]
        );
        match outcome.into_result() {
            Err(MigrationError::GateUnverified { group, databases }) => {
                assert_eq!(group, "before");
                assert_eq!(databases, vec!["secondary".to_string()]);
            }
            other => panic!("expected unverified gate, got {other:?}"),
        }
    }

    #[test]
    fn test_run_report_skips_header_for_unresolved_database() {
        let mut secondary = DatabaseRun::new("secondary");
        secondary.error = Some("could not connect to database 'secondary': refused".to_string());
        let report = RunReport {
            group: Some(Before),
            multi_database: true,
            databases: vec![DatabaseRun::new("primary"), secondary],
        };
        assert_eq!(
            report.lines(),
            vec!["Failed to run migrations for secondary: could not connect to database 'secondary': refused"]
        );
    }
}
