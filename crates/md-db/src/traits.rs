//! Table store trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use md_core::{Row, RowKey, TableName, TableSchema, Value};

/// Overwrite of selected columns on the single row matching `key`
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    /// Values of the change set's key columns identifying the target row
    pub key: RowKey,
    /// Columns to overwrite, with their new values
    pub assignments: Vec<(String, Value)>,
}

/// Inserts and updates applied to one table as a single atomic unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Columns identifying rows for `updates`
    pub key_columns: Vec<String>,
    /// Rows to append
    pub inserts: Vec<Row>,
    /// Rows to modify in place
    pub updates: Vec<RowUpdate>,
}

impl ChangeSet {
    pub fn new(key_columns: Vec<String>) -> Self {
        Self {
            key_columns,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Rows written by [`TableStore::apply`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Storage substrate for the pipeline's tables
///
/// The pipeline needs only full scans and atomic change-set application;
/// match logic lives above this trait. Implementations must be
/// Send + Sync for async operation.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create the table (and its schema namespace) if it does not exist
    async fn ensure_table(&self, table: &TableName, schema: &TableSchema) -> DbResult<()>;

    /// Check if a table exists
    async fn relation_exists(&self, table: &TableName) -> DbResult<bool>;

    /// Read every row of a table, projected onto `schema`
    async fn scan(&self, table: &TableName, schema: &TableSchema) -> DbResult<Vec<Row>>;

    /// Apply all inserts and updates atomically: either all land or none do
    async fn apply(
        &self,
        table: &TableName,
        schema: &TableSchema,
        changes: &ChangeSet,
    ) -> DbResult<ApplyOutcome>;

    /// Number of rows in a table
    async fn row_count(&self, table: &TableName) -> DbResult<usize>;

    /// Drop a table if it exists
    async fn drop_if_exists(&self, table: &TableName) -> DbResult<()>;

    /// Store type identifier for logging
    fn db_type(&self) -> &'static str;
}
