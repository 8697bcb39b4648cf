//! Discovery of Lua migration files on disk.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{MigrationError, Result};
use crate::migration::{MigrationRecord, group_from_source};

/// `<version>_<name>.lua`, e.g. `20240101120000_add_user_index.lua`.
static MIGRATION_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_([A-Za-z0-9_]+)\.lua$").expect("migration file regex is valid"));

/// Discover migration files in `migrations_dir`, ascending by version.
///
/// Files that do not follow the naming convention are ignored. A missing
/// directory yields no migrations.
pub fn discover_migrations(migrations_dir: &Path) -> Result<Vec<MigrationRecord>> {
    let mut migrations = Vec::new();

    if !migrations_dir.exists() {
        return Ok(migrations);
    }

    let mut seen = HashSet::new();
    for entry in std::fs::read_dir(migrations_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(captures) = MIGRATION_FILE.captures(filename) else {
            continue;
        };

        let version: u64 = captures[1]
            .parse()
            .map_err(|err| MigrationError::InvalidMigrationFile {
                path: path.clone(),
                message: format!("version is not a number: {err}"),
            })?;
        if !seen.insert(version) {
            return Err(MigrationError::DuplicateVersion {
                version,
                path: path.clone(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let group = group_from_source(&content)?;

        migrations.push(MigrationRecord::new(version, &captures[2], group).with_source(&path));
    }

    migrations.sort_by_key(|migration| migration.version);
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MigrationGroup;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_discover_sorted_with_groups() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "3_kappa.lua", "return 1");
        write(dir, "0_alpha.lua", "-- group: before\nreturn 1");
        write(dir, "2_delta.lua", "-- drops the legacy keys\n-- group: change\nreturn 1");

        let migrations = discover_migrations(dir).unwrap();
        let summary: Vec<_> = migrations
            .iter()
            .map(|m| (m.version, m.name.as_str(), m.group))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "alpha", Some(MigrationGroup::Before)),
                (2, "delta", Some(MigrationGroup::Change)),
                (3, "kappa", None),
            ]
        );
        assert_eq!(migrations[0].source.as_deref(), Some(dir.join("0_alpha.lua").as_path()));
    }

    #[test]
    fn test_discover_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "1_init.lua", "return 1");
        write(dir, "README.md", "# readme");
        write(dir, "notes.lua", "return 1");
        write(dir, "2_init.sql", "SELECT 1;");

        let migrations = discover_migrations(dir).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].name, "init");
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let migrations = discover_migrations(&temp_dir.path().join("nonexistent")).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_discover_rejects_duplicate_versions() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "1_first.lua", "return 1");
        write(dir, "01_second.lua", "return 1");

        let err = discover_migrations(dir).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateVersion { version: 1, .. }));
    }

    #[test]
    fn test_discover_rejects_custom_group() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "1_party.lua", "-- group: drunk\nreturn 1");

        let err = discover_migrations(temp_dir.path()).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidGroup { .. }));
    }
}
