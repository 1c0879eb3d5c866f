use super::*;
use std::fs;
use tempfile::TempDir;

fn global(project_dir: &Path) -> GlobalArgs {
    GlobalArgs {
        verbose: false,
        project_dir: project_dir.display().to_string(),
        config: None,
        target: None,
    }
}

#[test]
fn test_column_widths() {
    let widths = calculate_column_widths(
        &["TABLE", "ROWS"],
        &[
            vec!["dimcustomer_gold".to_string(), "7".to_string()],
            vec!["sales_silver".to_string(), "12345".to_string()],
        ],
    );
    assert_eq!(widths, vec![16, 5]);
}

#[test]
fn test_database_path_resolution() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::with_name("lab");
    let mut args = global(dir.path());

    assert_eq!(database_path(&config, &args), ":memory:");

    config.database.path = "warehouse.duckdb".to_string();
    assert_eq!(
        database_path(&config, &args),
        dir.path().join("warehouse.duckdb").display().to_string()
    );

    args.target = Some(":memory:".to_string());
    assert_eq!(database_path(&config, &args), ":memory:");
}

#[test]
fn test_load_config_from_project_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("medallion.yml"), "name: lab\n").unwrap();

    let config = load_config(&global(dir.path())).unwrap();
    assert_eq!(config.name, "lab");
    assert_eq!(
        run_state_path(&config, &global(dir.path())),
        dir.path().join("target").join(RUN_STATE_FILE)
    );
}

#[test]
fn test_load_config_missing() {
    let dir = TempDir::new().unwrap();
    let err = load_config(&global(dir.path())).unwrap_err();
    assert!(format!("{:#}", err).contains("E001"));
}

#[test]
fn test_open_store_uses_duckdb() {
    let dir = TempDir::new().unwrap();
    let mut args = global(dir.path());
    args.verbose = true;
    args.target = Some(":memory:".to_string());

    let store = open_store(&Config::with_name("lab"), &args).unwrap();
    assert_eq!(store.db_type(), "duckdb");
}
