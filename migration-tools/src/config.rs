//! Project configuration (`migration-tools.toml`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, Result};
use crate::topology::{DEFAULT_MIGRATIONS_PATH, DatabaseTarget};

/// Configuration file looked up in the current directory and its ancestors.
pub const CONFIG_FILE: &str = "migration-tools.toml";

/// Name of the database assumed when none is configured.
pub const DEFAULT_DATABASE: &str = "primary";

/// Configuration stored in `migration-tools.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub settings: ToolSettings,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Redis key prefix of the applied-migrations ledger
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_true")]
    pub schema_dump: bool,
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,
    /// Refuse to run migrations that carry no group
    #[serde(default)]
    pub forced: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            schema_dump: true,
            schema_dir: default_schema_dir(),
            forced: false,
        }
    }
}

fn default_namespace() -> String {
    "migration_tools".to_string()
}

fn default_true() -> bool {
    true
}

fn default_schema_dir() -> String {
    "db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_path: Option<String>,
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

/// Runtime settings the orchestrator works with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Every configured database, replicas included, in configuration order
    pub databases: Vec<DatabaseTarget>,
    /// Regenerate schema snapshots after a database applied migrations
    pub dump_schema: bool,
    pub forced: bool,
}

impl Settings {
    pub fn new(databases: Vec<DatabaseTarget>) -> Self {
        Self {
            databases,
            dump_schema: true,
            forced: false,
        }
    }

    pub fn with_dump_schema(mut self, dump_schema: bool) -> Self {
        self.dump_schema = dump_schema;
        self
    }

    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }
}

/// Project context for migration-tools operations
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Directory relative paths in the configuration resolve against
    pub project_root: PathBuf,
    /// Path to the config file, if one was found
    pub config_path: Option<PathBuf>,
    /// Loaded configuration, defaults when no file exists
    pub config: ToolConfig,
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        Ok(Self::find_from(&current_dir)?.unwrap_or_else(|| Self::defaults(current_dir)))
    }

    /// Find the nearest config file starting from the given directory
    pub fn find_from(start: &Path) -> Result<Option<Self>> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::from_file(&candidate).map(Some);
            }
            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Load an explicit config file; its directory becomes the project root.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| MigrationError::Config(format!("failed to read {}: {err}", path.display())))?;
        let config: ToolConfig = toml::from_str(&content)
            .map_err(|err| MigrationError::Config(format!("failed to parse {}: {err}", path.display())))?;

        let project_root = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            project_root,
            config_path: Some(path.to_path_buf()),
            config,
        })
    }

    /// Context for a project without a config file.
    pub fn defaults(project_root: PathBuf) -> Self {
        Self {
            project_root,
            config_path: None,
            config: ToolConfig::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.settings.namespace
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.settings.schema_dir)
    }

    /// Database targets with migrations paths resolved against the project root.
    pub fn databases(&self) -> Result<Vec<DatabaseTarget>> {
        if self.config.databases.is_empty() {
            return Ok(vec![
                DatabaseTarget::new(DEFAULT_DATABASE, default_redis_url())
                    .with_migrations_path(self.project_root.join(DEFAULT_MIGRATIONS_PATH)),
            ]);
        }

        let mut seen = HashSet::new();
        self.config
            .databases
            .iter()
            .map(|db| {
                if db.name.trim().is_empty() {
                    return Err(MigrationError::Config("database name cannot be empty".to_string()));
                }
                if !seen.insert(db.name.as_str()) {
                    return Err(MigrationError::Config(format!("database '{}' is configured twice", db.name)));
                }
                let migrations_path = db.migrations_path.as_deref().unwrap_or(DEFAULT_MIGRATIONS_PATH);
                Ok(DatabaseTarget::new(&db.name, &db.url).with_migrations_path(self.project_root.join(migrations_path)))
            })
            .collect()
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings::new(self.databases()?)
            .with_dump_schema(self.config.settings.schema_dump)
            .with_forced(self.config.settings.forced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert_eq!(config.settings.namespace, "migration_tools");
        assert_eq!(config.settings.schema_dir, "db");
        assert!(config.settings.schema_dump);
        assert!(!config.settings.forced);
        assert!(config.databases.is_empty());
    }

    #[test]
    fn test_defaults_assume_single_primary() {
        let ctx = ProjectContext::defaults(PathBuf::from("/srv/app"));
        let databases = ctx.databases().unwrap();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].name, "primary");
        assert_eq!(databases[0].url, "${REDIS_URL}");
        assert_eq!(databases[0].migrations_path(), Path::new("/srv/app/db/migrate"));
        assert_eq!(ctx.schema_dir(), PathBuf::from("/srv/app/db"));
    }

    #[test]
    fn test_find_from_walks_up_to_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            r#"
[settings]
namespace = "shop"
forced = true

[[databases]]
name = "primary"
url = "redis://127.0.0.1/0"

[[databases]]
name = "secondary"
url = "${SECONDARY_URL}"
migrations_path = "db/secondary_migrate"
"#,
        )
        .unwrap();
        let nested = temp_dir.path().join("app/models");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = ProjectContext::find_from(&nested).unwrap().unwrap();
        assert_eq!(ctx.project_root, temp_dir.path());
        assert_eq!(ctx.namespace(), "shop");

        let settings = ctx.settings().unwrap();
        assert!(settings.forced);
        assert!(settings.dump_schema);
        let names: Vec<_> = settings.databases.iter().map(|db| db.name.as_str()).collect();
        assert_eq!(names, vec!["primary", "secondary"]);
        assert_eq!(
            settings.databases[1].migrations_path(),
            temp_dir.path().join("db/secondary_migrate")
        );
    }

    #[test]
    fn test_find_from_without_config() {
        let temp_dir = TempDir::new().unwrap();
        // Ancestors of a fresh temp dir carry no config file.
        assert!(ProjectContext::find_from(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_database_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[[databases]]\nname = \"primary\"\n\n[[databases]]\nname = \"primary\"\n",
        )
        .unwrap();

        let ctx = ProjectContext::from_file(&path).unwrap();
        assert!(matches!(ctx.settings(), Err(MigrationError::Config(_))));
    }

    #[test]
    fn test_unparseable_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[[databases]\nname = ").unwrap();
        assert!(matches!(ProjectContext::from_file(&path), Err(MigrationError::Config(_))));
    }
}
