use super::*;
use crate::traits::RowUpdate;
use md_core::{ColumnDef, RowKey};

fn schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnDef::required("Name", ColumnType::String),
        ColumnDef::nullable("Email", ColumnType::String),
        ColumnDef::required("Amount", ColumnType::Decimal),
    ])
}

fn keys() -> Vec<String> {
    vec!["Name".to_string(), "Email".to_string()]
}

fn row(name: &str, email: Option<&str>, amount: f64) -> Row {
    Row::new()
        .with("Name", name)
        .with("Email", email)
        .with("Amount", amount)
}

async fn seeded(rows: Vec<Row>) -> (MemoryStore, TableName) {
    let store = MemoryStore::new();
    let table = TableName::new("customers");
    store.ensure_table(&table, &schema()).await.unwrap();
    let mut changes = ChangeSet::new(keys());
    changes.inserts = rows;
    store.apply(&table, &schema(), &changes).await.unwrap();
    (store, table)
}

#[tokio::test]
async fn test_insert_and_scan() {
    let (store, table) = seeded(vec![row("Ann", Some("a@x"), 1.0)]).await;

    let rows = store.scan(&table, &schema()).await.unwrap();
    assert_eq!(rows, vec![row("Ann", Some("a@x"), 1.0)]);
    assert_eq!(store.row_count(&table).await.unwrap(), 1);
    assert_eq!(store.db_type(), "memory");
}

#[tokio::test]
async fn test_insert_drops_unknown_columns_and_widens_ints() {
    let (store, table) = seeded(vec![Row::new()
        .with("Name", "Ann")
        .with("Amount", 3i64)
        .with("Extra", "ignored")])
    .await;

    let rows = store.scan(&table, &schema()).await.unwrap();
    assert_eq!(rows[0].get("Amount"), Some(&Value::Decimal(3.0)));
    assert_eq!(rows[0].get("Email"), Some(&Value::Null));
    assert!(!rows[0].contains("Extra"));
}

#[tokio::test]
async fn test_update_by_null_safe_key() {
    let (store, table) = seeded(vec![row("Ann", None, 1.0), row("Ann", Some("a@x"), 1.0)]).await;

    let mut changes = ChangeSet::new(keys());
    changes.updates.push(RowUpdate {
        key: RowKey(vec![Value::from("Ann"), Value::Null]),
        assignments: vec![("Amount".to_string(), Value::Decimal(5.0))],
    });
    let outcome = store.apply(&table, &schema(), &changes).await.unwrap();
    assert_eq!(outcome, ApplyOutcome { inserted: 0, updated: 1 });

    let rows = store.scan(&table, &schema()).await.unwrap();
    assert_eq!(rows[0].get("Amount"), Some(&Value::Decimal(5.0)));
    assert_eq!(rows[1].get("Amount"), Some(&Value::Decimal(1.0)));
}

#[tokio::test]
async fn test_empty_assignments_are_ignored() {
    let (store, table) = seeded(vec![row("Ann", None, 1.0)]).await;

    let mut changes = ChangeSet::new(keys());
    changes.updates.push(RowUpdate {
        key: RowKey(vec![Value::from("Ann"), Value::Null]),
        assignments: Vec::new(),
    });
    let outcome = store.apply(&table, &schema(), &changes).await.unwrap();
    assert_eq!(outcome.updated, 0);
}

#[tokio::test]
async fn test_rejected_change_set_leaves_table_untouched() {
    let (store, table) = seeded(vec![row("Ann", None, 1.0)]).await;

    let mut changes = ChangeSet::new(keys());
    changes.inserts.push(row("Bob", None, 2.0));
    changes.inserts.push(Row::new().with("Amount", 3.0));
    let err = store.apply(&table, &schema(), &changes).await.unwrap_err();

    assert!(matches!(err, DbError::Constraint { .. }), "got {err}");
    assert_eq!(store.row_count(&table).await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_of_unknown_column_is_rejected() {
    let (store, table) = seeded(vec![row("Ann", None, 1.0)]).await;

    let mut changes = ChangeSet::new(keys());
    changes.updates.push(RowUpdate {
        key: RowKey(vec![Value::from("Ann"), Value::Null]),
        assignments: vec![("Nope".to_string(), Value::Int(1))],
    });
    assert!(store.apply(&table, &schema(), &changes).await.is_err());
}

#[tokio::test]
async fn test_missing_table() {
    let store = MemoryStore::new();
    let table = TableName::new("missing");

    assert!(!store.relation_exists(&table).await.unwrap());
    assert!(matches!(
        store.scan(&table, &schema()).await,
        Err(DbError::TableNotFound(_))
    ));
    store.drop_if_exists(&table).await.unwrap();
}

#[tokio::test]
async fn test_ensure_table_keeps_existing_rows() {
    let (store, table) = seeded(vec![row("Ann", None, 1.0)]).await;
    store.ensure_table(&table, &schema()).await.unwrap();
    assert_eq!(store.row_count(&table).await.unwrap(), 1);
}
