//! DuckDB table store implementation

use crate::error::{DbError, DbResult};
use crate::traits::{ApplyOutcome, ChangeSet, TableStore};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use duckdb::{Connection, ToSql};
use md_core::{ColumnDef, ColumnType, Row, TableName, TableSchema, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// DuckDB table store
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    fn relation_exists_sync(&self, table: &TableName) -> DbResult<bool> {
        let conn = self.lock()?;
        let schema = table.schema().unwrap_or("main");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            duckdb::params![schema, table.table()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn scan_sync(&self, table: &TableName, schema: &TableSchema) -> DbResult<Vec<Row>> {
        let select_list: Vec<String> = schema.columns.iter().map(select_expr).collect();
        let sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            quote_qualified(table)
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut decoded = Row::new();
            for (i, col) in schema.columns.iter().enumerate() {
                let value = read_value(row, i, col).map_err(|message| DbError::Decode {
                    table: table.to_string(),
                    column: col.name.clone(),
                    message,
                })?;
                decoded.set(&col.name, value);
            }
            out.push(decoded);
        }
        Ok(out)
    }

    fn apply_sync(
        &self,
        table: &TableName,
        schema: &TableSchema,
        changes: &ChangeSet,
    ) -> DbResult<ApplyOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut outcome = ApplyOutcome::default();

        if !changes.inserts.is_empty() {
            let column_list: Vec<String> =
                schema.columns.iter().map(|c| quote_ident(&c.name)).collect();
            let placeholders: Vec<&str> = schema
                .columns
                .iter()
                .map(|c| placeholder(c.data_type))
                .collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_qualified(table),
                column_list.join(", "),
                placeholders.join(", ")
            );
            let mut stmt = tx.prepare(&sql)?;
            for row in &changes.inserts {
                let params: Vec<Box<dyn ToSql>> = schema
                    .columns
                    .iter()
                    .map(|c| to_param(row.get(&c.name).unwrap_or(&Value::Null)))
                    .collect();
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
                outcome.inserted += stmt.execute(refs.as_slice())?;
            }
        }

        for update in &changes.updates {
            if update.assignments.is_empty() {
                continue;
            }
            let set_list: Vec<String> = update
                .assignments
                .iter()
                .map(|(name, _)| {
                    format!(
                        "{} = {}",
                        quote_ident(name),
                        column_placeholder(schema, name)
                    )
                })
                .collect();
            let predicate: Vec<String> = changes
                .key_columns
                .iter()
                .map(|name| {
                    format!(
                        "{} IS NOT DISTINCT FROM {}",
                        quote_ident(name),
                        column_placeholder(schema, name)
                    )
                })
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_qualified(table),
                set_list.join(", "),
                predicate.join(" AND ")
            );

            let mut params: Vec<Box<dyn ToSql>> =
                update.assignments.iter().map(|(_, v)| to_param(v)).collect();
            params.extend(update.key.0.iter().map(to_param));
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            outcome.updated += tx.execute(&sql, refs.as_slice())?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn row_count_sync(&self, table: &TableName) -> DbResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_qualified(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl TableStore for DuckDbBackend {
    async fn ensure_table(&self, table: &TableName, schema: &TableSchema) -> DbResult<()> {
        if let Some(namespace) = table.schema() {
            self.execute_sync(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_ident(namespace)
            ))?;
        }
        let col_defs: Vec<String> = schema.columns.iter().map(column_ddl).collect();
        self.execute_sync(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_qualified(table),
            col_defs.join(", ")
        ))?;
        Ok(())
    }

    async fn relation_exists(&self, table: &TableName) -> DbResult<bool> {
        self.relation_exists_sync(table)
    }

    async fn scan(&self, table: &TableName, schema: &TableSchema) -> DbResult<Vec<Row>> {
        self.scan_sync(table, schema)
    }

    async fn apply(
        &self,
        table: &TableName,
        schema: &TableSchema,
        changes: &ChangeSet,
    ) -> DbResult<ApplyOutcome> {
        if changes.is_empty() {
            return Ok(ApplyOutcome::default());
        }
        log::debug!(
            "Applying {} inserts and {} updates to {}",
            changes.inserts.len(),
            changes.updates.len(),
            table
        );
        self.apply_sync(table, schema, changes)
    }

    async fn row_count(&self, table: &TableName) -> DbResult<usize> {
        self.row_count_sync(table)
    }

    async fn drop_if_exists(&self, table: &TableName) -> DbResult<()> {
        self.execute_sync(&format!("DROP TABLE IF EXISTS {}", quote_qualified(table)))?;
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

/// DuckDB type for a logical column type
pub fn sql_type(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::String => "VARCHAR",
        ColumnType::Integer => "BIGINT",
        ColumnType::Decimal => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Date => "DATE",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote each part of a possibly schema-qualified table name
pub fn quote_qualified(table: &TableName) -> String {
    match table.schema() {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table.table())),
        None => quote_ident(table.table()),
    }
}

fn column_ddl(col: &ColumnDef) -> String {
    let null = if col.nullable { "" } else { " NOT NULL" };
    format!("{} {}{}", quote_ident(&col.name), sql_type(col.data_type), null)
}

/// Dates and timestamps travel as text so no driver-side temporal
/// conversions are involved
fn select_expr(col: &ColumnDef) -> String {
    match col.data_type {
        ColumnType::Date | ColumnType::Timestamp => {
            format!("CAST({} AS VARCHAR)", quote_ident(&col.name))
        }
        _ => quote_ident(&col.name),
    }
}

fn placeholder(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::Date => "CAST(? AS DATE)",
        ColumnType::Timestamp => "CAST(? AS TIMESTAMP)",
        _ => "?",
    }
}

fn column_placeholder(schema: &TableSchema, name: &str) -> &'static str {
    schema
        .column(name)
        .map(|c| placeholder(c.data_type))
        .unwrap_or("?")
}

fn to_param(value: &Value) -> Box<dyn ToSql> {
    match value {
        Value::Null => Box::new(None::<String>),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => Box::new(*i),
        Value::Decimal(d) => Box::new(*d),
        Value::Text(s) => Box::new(s.clone()),
        Value::Date(d) => Box::new(d.format(DATE_FORMAT).to_string()),
        Value::Timestamp(ts) => Box::new(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
    }
}

fn read_value(row: &duckdb::Row<'_>, idx: usize, col: &ColumnDef) -> Result<Value, String> {
    let value = match col.data_type {
        ColumnType::String => row
            .get::<_, Option<String>>(idx)
            .map_err(|e| e.to_string())?
            .map(Value::Text),
        ColumnType::Integer => row
            .get::<_, Option<i64>>(idx)
            .map_err(|e| e.to_string())?
            .map(Value::Int),
        ColumnType::Decimal => row
            .get::<_, Option<f64>>(idx)
            .map_err(|e| e.to_string())?
            .map(Value::Decimal),
        ColumnType::Boolean => row
            .get::<_, Option<bool>>(idx)
            .map_err(|e| e.to_string())?
            .map(Value::Bool),
        ColumnType::Date => match row.get::<_, Option<String>>(idx).map_err(|e| e.to_string())? {
            Some(s) => Some(Value::Date(
                NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| e.to_string())?,
            )),
            None => None,
        },
        ColumnType::Timestamp => {
            match row.get::<_, Option<String>>(idx).map_err(|e| e.to_string())? {
                Some(s) => Some(Value::Timestamp(
                    NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                        .map_err(|e| e.to_string())?,
                )),
                None => None,
            }
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
