//! In-process table store
//!
//! Holds every table as a vector of rows behind a single mutex.

use crate::error::{DbError, DbResult};
use crate::traits::{ApplyOutcome, ChangeSet, TableStore};
use async_trait::async_trait;
use md_core::{ColumnType, Row, TableName, TableSchema, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemTable {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// Table store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<TableName, MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, HashMap<TableName, MemTable>>> {
        self.tables
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }
}

/// Project onto the table's columns, widening integers stored in decimal
/// columns the same way a database column would
fn conform(schema: &TableSchema, row: &Row) -> Row {
    let mut projected = schema.project(row);
    for col in &schema.columns {
        if col.data_type == ColumnType::Decimal {
            if let Some(Value::Int(i)) = projected.get(&col.name) {
                let widened = Value::Decimal(*i as f64);
                projected.set(&col.name, widened);
            }
        }
    }
    projected
}

fn constraint(table: &TableName, err: impl std::fmt::Display) -> DbError {
    DbError::Constraint {
        table: table.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn ensure_table(&self, table: &TableName, schema: &TableSchema) -> DbResult<()> {
        let mut tables = self.lock()?;
        tables.entry(table.clone()).or_insert_with(|| MemTable {
            schema: schema.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn relation_exists(&self, table: &TableName) -> DbResult<bool> {
        Ok(self.lock()?.contains_key(table))
    }

    async fn scan(&self, table: &TableName, schema: &TableSchema) -> DbResult<Vec<Row>> {
        let tables = self.lock()?;
        let stored = tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(stored.rows.iter().map(|r| schema.project(r)).collect())
    }

    async fn apply(
        &self,
        table: &TableName,
        _schema: &TableSchema,
        changes: &ChangeSet,
    ) -> DbResult<ApplyOutcome> {
        let mut tables = self.lock()?;
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        // Build the complete next state first so a bad row leaves the
        // table untouched.
        let mut next = stored.rows.clone();
        let mut outcome = ApplyOutcome::default();

        for row in &changes.inserts {
            let row = conform(&stored.schema, row);
            stored
                .schema
                .check_row(table.as_str(), &row)
                .map_err(|e| constraint(table, e))?;
            next.push(row);
            outcome.inserted += 1;
        }

        for update in &changes.updates {
            if update.assignments.is_empty() {
                continue;
            }
            for row in next
                .iter_mut()
                .filter(|r| r.key(&changes.key_columns) == update.key)
            {
                for (column, value) in &update.assignments {
                    if !stored.schema.contains(column) {
                        return Err(constraint(table, format!("unknown column {}", column)));
                    }
                    row.set(column, value.clone());
                }
                *row = conform(&stored.schema, row);
                stored
                    .schema
                    .check_row(table.as_str(), row)
                    .map_err(|e| constraint(table, e))?;
                outcome.updated += 1;
            }
        }

        stored.rows = next;
        Ok(outcome)
    }

    async fn row_count(&self, table: &TableName) -> DbResult<usize> {
        let tables = self.lock()?;
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    async fn drop_if_exists(&self, table: &TableName) -> DbResult<()> {
        self.lock()?.remove(table);
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
