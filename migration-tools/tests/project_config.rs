use migration_tools::config::CONFIG_FILE;
use migration_tools::{MemoryEngine, MigrationGroup, MigrationRecord, Orchestrator, ProjectContext, RunContext};
use tempfile::TempDir;

const CONFIG: &str = r#"
[settings]
namespace = "shop"
schema_dump = false

[[databases]]
name = "primary"
url = "redis://127.0.0.1/0"

[[databases]]
name = "primary_replica"
url = "redis://127.0.0.1/1"

[[databases]]
name = "analytics"
url = "${ANALYTICS_REDIS_URL}"
migrations_path = "db/analytics_migrate"
"#;

#[tokio::test]
async fn configured_databases_drive_the_orchestrator() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::write(root.join(CONFIG_FILE), CONFIG).unwrap();

    let project = ProjectContext::find_from(root).unwrap().expect("config found");
    let settings = project.settings().unwrap();
    assert_eq!(settings.databases.len(), 3);
    assert!(!settings.dump_schema);

    let engine = MemoryEngine::new()
        .with_migrations(
            root.join("db/migrate"),
            vec![MigrationRecord::new(10, "AddCarts", Some(MigrationGroup::Before))],
        )
        .with_migrations(
            root.join("db/analytics_migrate"),
            vec![MigrationRecord::new(20, "AddRollups", Some(MigrationGroup::Before))],
        );
    let mut orchestrator = Orchestrator::new(engine.clone(), settings);

    let mut ctx = RunContext::new(Some(MigrationGroup::Before));
    let report = orchestrator.run_group(&mut ctx).await.unwrap();
    assert!(report.multi_database);
    assert_eq!(
        engine.executed(),
        vec![("primary".to_string(), 10), ("analytics".to_string(), 20)]
    );
    assert!(engine.schema_dumps().is_empty());
}

#[test]
fn missing_config_falls_back_to_single_primary() {
    let temp_dir = TempDir::new().unwrap();
    let project = ProjectContext::find_from(temp_dir.path())
        .unwrap()
        .unwrap_or_else(|| ProjectContext::defaults(temp_dir.path().to_path_buf()));

    let settings = project.settings().unwrap();
    assert_eq!(settings.databases.len(), 1);
    assert_eq!(settings.databases[0].name, "primary");
    assert_eq!(settings.databases[0].migrations_path(), temp_dir.path().join("db/migrate"));
}
