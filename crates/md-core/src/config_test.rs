use super::*;
use crate::schema::ColumnType;
use tempfile::TempDir;

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("name: sales_lakehouse").unwrap();
    assert_eq!(config.name, "sales_lakehouse");
    assert_eq!(config.source.path, "files/bronze");
    assert_eq!(config.source.extension, "csv");
    assert!(config.source.has_header);
    assert_eq!(config.source.mode, IngestMode::Lenient);
    assert_eq!(config.cutoff_date, NaiveDate::from_ymd_opt(2019, 8, 1).unwrap());
    assert_eq!(config.database.path, ":memory:");
    assert_eq!(config.tables.silver, "sales_silver");
    assert_eq!(config.tables.fact, "factsales_gold");
    assert_eq!(config.source.columns.columns.len(), 9);
    config.validate().unwrap();
}

#[test]
fn test_default_merge_keys() {
    let config = Config::with_name("p");
    assert_eq!(
        config.merge_keys.get(MergeCallSite::Silver),
        &["SalesOrderNumber", "OrderDate", "CustomerName", "Item"]
    );
    assert_eq!(config.merge_keys.get(MergeCallSite::DimDate), &["OrderDate"]);
    assert_eq!(
        config.merge_keys.get(MergeCallSite::DimCustomer),
        &["CustomerName", "Email"]
    );
    assert_eq!(
        config.merge_keys.get(MergeCallSite::DimProduct),
        &["ItemName", "ItemInfo"]
    );
    assert_eq!(
        config.merge_keys.get(MergeCallSite::Fact),
        &["OrderDate", "CustomerID", "ItemID"]
    );
    assert!(config.update_columns.get(MergeCallSite::Silver).is_empty());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
name: sales_lakehouse
source:
  path: data/raw
  has_header: false
  delimiter: ";"
  mode: strict
  columns:
    - { name: SalesOrderNumber, type: string, nullable: false }
    - { name: SalesOrderLineNumber, type: int, nullable: false }
    - { name: OrderDate, type: date, nullable: false }
    - { name: CustomerName, type: string }
    - { name: Email, type: string, nullable: false }
    - { name: Item, type: string, nullable: false }
    - { name: Quantity, type: integer, nullable: false }
    - { name: UnitPrice, type: float, nullable: false }
    - { name: Tax, type: float, nullable: false }
    - { name: Region, type: string }
cutoff_date: 2020-01-01
database:
  path: warehouse.duckdb
tables:
  silver: silver.sales
  fact: gold.factsales
update_columns:
  silver: [ModifiedTS, Quantity]
parallel_dimensions: true
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.source.delimiter, ';');
    assert_eq!(config.source.mode, IngestMode::Strict);
    assert_eq!(config.source.columns.columns.len(), 10);
    assert_eq!(
        config.source.columns.column("UnitPrice").unwrap().data_type,
        ColumnType::Decimal
    );
    assert_eq!(config.cutoff_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    assert_eq!(config.tables.silver.schema(), Some("silver"));
    assert_eq!(config.tables.dim_date, "dimdate_gold");
    assert_eq!(
        config.update_columns.get(MergeCallSite::Silver),
        &["ModifiedTS", "Quantity"]
    );
    assert!(config.parallel_dimensions);
}

#[test]
fn test_unknown_field_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("name: p\nmodel_paths: [models]");
    assert!(result.is_err());
}

#[test]
fn test_empty_name_invalid() {
    let config = Config::with_name("");
    assert!(matches!(
        config.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_missing_source_column_invalid() {
    let mut config = Config::with_name("p");
    config.source.columns.columns.retain(|c| c.name != "Tax");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("missing required column 'Tax'"));
}

#[test]
fn test_wrong_source_column_type_invalid() {
    let mut config = Config::with_name("p");
    for col in &mut config.source.columns.columns {
        if col.name == "OrderDate" {
            col.data_type = ColumnType::String;
        }
    }
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("must be of type date"));
}

#[test]
fn test_nullable_required_source_column_invalid() {
    let yaml = r#"
name: p
source:
  columns:
    - { name: SalesOrderNumber, type: string, nullable: false }
    - { name: SalesOrderLineNumber, type: integer, nullable: false }
    - { name: OrderDate, type: date, nullable: false }
    - { name: CustomerName, type: string }
    - { name: Email, type: string, nullable: false }
    - { name: Item, type: string, nullable: false }
    - { name: Quantity, type: integer }
    - { name: UnitPrice, type: decimal, nullable: false }
    - { name: Tax, type: decimal, nullable: false }
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("'Quantity' cannot be nullable"));

    let mut config = Config::with_name("p");
    for col in &mut config.source.columns.columns {
        col.nullable = col.name == "CustomerName";
    }
    config.validate().unwrap();
}

#[test]
fn test_merge_key_not_in_table_invalid() {
    let mut config = Config::with_name("p");
    config.merge_keys.dim_product = vec!["Item".to_string()];
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("merge_keys.dim_product"));
}

#[test]
fn test_empty_merge_keys_invalid() {
    let mut config = Config::with_name("p");
    config.merge_keys.fact.clear();
    assert!(config.validate().is_err());
}

#[test]
fn test_update_column_cannot_be_key() {
    let mut config = Config::with_name("p");
    config.update_columns.dim_customer = vec!["Email".to_string()];
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("is a merge key"));
}

#[test]
fn test_duplicate_table_names_invalid() {
    let mut config = Config::with_name("p");
    config.tables.fact = TableName::new("sales_silver");
    assert!(config.validate().is_err());
}

#[test]
fn test_non_ascii_delimiter_invalid() {
    let mut config = Config::with_name("p");
    config.source.delimiter = '§';
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("medallion.yml"), "name: lakehouse\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "lakehouse");
    assert_eq!(
        config.source_path_absolute(dir.path()),
        dir.path().join("files/bronze")
    );
    assert_eq!(
        config.target_path_absolute(dir.path()),
        dir.path().join("target")
    );
}

#[test]
fn test_load_from_dir_yaml_extension() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("medallion.yaml"), "name: lakehouse\n").unwrap();
    assert!(Config::load_from_dir(dir.path()).is_ok());
}

#[test]
fn test_load_missing_config() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Config::load_from_dir(dir.path()),
        Err(CoreError::ConfigNotFound { .. })
    ));
}

#[test]
fn test_load_validates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("medallion.yml");
    std::fs::write(&path, "name: p\nmerge_keys:\n  fact: []\n").unwrap();
    assert!(matches!(
        Config::load(&path),
        Err(CoreError::ConfigInvalid { .. })
    ));
}
