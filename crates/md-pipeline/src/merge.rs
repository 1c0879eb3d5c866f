//! Keyed upsert shared by every table of the pipeline
//!
//! A merge scans the target once, indexes it by the match-key tuple and
//! decides per incoming row whether to insert it, update the single row
//! it matches, or fail because the key is ambiguous. The resulting
//! change set is applied in one atomic call to the store.

use crate::error::{PipelineError, PipelineResult};
use md_core::{Row, RowKey, TableName, TableSchema, Value};
use md_db::{ChangeSet, DbError, RowUpdate, TableStore};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Target and match rules of one merge call
#[derive(Debug, Clone, Copy)]
pub struct MergeSpec<'a> {
    pub table: &'a TableName,
    pub schema: &'a TableSchema,
    /// Columns whose values identify a row; compared null-safely
    pub match_keys: &'a [String],
    /// Columns overwritten on a match; empty leaves matched rows untouched
    pub update_columns: &'a [String],
}

/// Row counts of one merge call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Incoming rows that matched and changed nothing
    pub unchanged: usize,
}

/// Changes a merge would make, before they are applied
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub changes: ChangeSet,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Existing,
    Inserted,
}

/// Decide the inserts and updates for merging `incoming` into `existing`
///
/// Rows inserted earlier in the same batch take part in matching, so
/// duplicate keys within a batch collapse onto their first occurrence.
pub fn plan_merge(
    spec: &MergeSpec<'_>,
    existing: Vec<Row>,
    incoming: Vec<Row>,
) -> PipelineResult<MergePlan> {
    let update_columns: Vec<&String> = spec
        .update_columns
        .iter()
        .filter(|c| !spec.match_keys.contains(c))
        .collect();

    let mut rows: Vec<(Origin, Row)> = existing
        .into_iter()
        .map(|r| (Origin::Existing, r))
        .collect();
    let mut index: HashMap<RowKey, Vec<usize>> = HashMap::with_capacity(rows.len());
    for (i, (_, row)) in rows.iter().enumerate() {
        index.entry(row.key(spec.match_keys)).or_default().push(i);
    }

    let mut outcome = MergeOutcome::default();
    let mut modified: BTreeSet<usize> = BTreeSet::new();

    for row in incoming {
        let key = row.key(spec.match_keys);
        let target = match index.get(&key).map(Vec::as_slice) {
            None | Some([]) => {
                index.insert(key, vec![rows.len()]);
                rows.push((Origin::Inserted, spec.schema.project(&row)));
                outcome.inserted += 1;
                continue;
            }
            Some([single]) => *single,
            Some(many) => {
                return Err(PipelineError::MergeConflict {
                    table: spec.table.to_string(),
                    key: key.to_string(),
                    matches: many.len(),
                });
            }
        };

        let (origin, current) = &mut rows[target];
        let mut changed = false;
        for column in &update_columns {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            if current.get(column) != Some(&value) {
                current.set(column, value);
                changed = true;
            }
        }

        if changed && *origin == Origin::Existing {
            modified.insert(target);
        } else if !changed {
            outcome.unchanged += 1;
        }
    }

    let mut changes = ChangeSet::new(spec.match_keys.to_vec());
    for i in &modified {
        let row = &rows[*i].1;
        changes.updates.push(RowUpdate {
            key: row.key(spec.match_keys),
            assignments: update_columns
                .iter()
                .map(|c| (c.to_string(), row.get(c).cloned().unwrap_or(Value::Null)))
                .collect(),
        });
    }
    outcome.updated = modified.len();
    changes.inserts = rows
        .into_iter()
        .filter(|(origin, _)| *origin == Origin::Inserted)
        .map(|(_, row)| row)
        .collect();

    Ok(MergePlan { changes, outcome })
}

/// Handle to the pipeline's tables with one writer per table
pub struct Catalog {
    store: Arc<dyn TableStore>,
    locks: Mutex<HashMap<TableName, Arc<AsyncMutex<()>>>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying table store
    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    fn table_lock(&self, table: &TableName) -> PipelineResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        Ok(locks.entry(table.clone()).or_default().clone())
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_table(
        &self,
        table: &TableName,
        schema: &TableSchema,
    ) -> PipelineResult<()> {
        self.store.ensure_table(table, schema).await?;
        Ok(())
    }

    /// Read a whole table
    pub async fn scan(
        &self,
        table: &TableName,
        schema: &TableSchema,
    ) -> PipelineResult<Vec<Row>> {
        let lock = self.table_lock(table)?;
        let _guard = lock.lock().await;
        Ok(self.store.scan(table, schema).await?)
    }

    /// Upsert `rows` into the table named by `spec`
    ///
    /// Holds the table's writer lock from the scan through the apply so
    /// concurrent merges into the same table cannot interleave.
    pub async fn upsert(
        &self,
        spec: &MergeSpec<'_>,
        rows: Vec<Row>,
    ) -> PipelineResult<MergeOutcome> {
        let lock = self.table_lock(spec.table)?;
        let _guard = lock.lock().await;

        let incoming = rows.len();
        let existing = self.store.scan(spec.table, spec.schema).await?;
        let plan = plan_merge(spec, existing, rows)?;

        if !plan.changes.is_empty() {
            self.store
                .apply(spec.table, spec.schema, &plan.changes)
                .await?;
        }

        log::debug!(
            "Merged {} rows into {}: {} inserted, {} updated, {} unchanged",
            incoming,
            spec.table,
            plan.outcome.inserted,
            plan.outcome.updated,
            plan.outcome.unchanged
        );
        Ok(plan.outcome)
    }
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod tests;
