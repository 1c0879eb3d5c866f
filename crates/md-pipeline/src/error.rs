//! Error and warning types for md-pipeline

use crate::pipeline::Stage;
use md_core::{CoreError, TableName};
use md_db::DbError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source value cannot be coerced to its declared column type (P001)
    #[error("[P001] Schema mismatch in {file} line {line}, column '{column}': cannot read '{value}' as {expected}")]
    SchemaMismatch {
        file: String,
        line: usize,
        column: String,
        value: String,
        expected: String,
    },

    /// An incoming row matches more than one target row (P002)
    #[error("[P002] Merge conflict on {table}: key {key} matches {matches} target rows")]
    MergeConflict {
        table: String,
        key: String,
        matches: usize,
    },

    /// A table read or write failed (P003)
    #[error("[P003] Storage unavailable: {0}")]
    StorageUnavailable(#[from] DbError),

    /// The source directory does not exist (P004)
    #[error("[P004] Source directory not found: {path}")]
    SourceNotFound { path: String },

    /// A source file could not be read (P005)
    #[error("[P005] Failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A source file is not well-formed delimited text (P006)
    #[error("[P006] Malformed source file '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    /// A stored row could not be decoded into its record type
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A failed batch: the stage that stopped it, how far it got and why
#[derive(Error, Debug)]
#[error("Stage '{stage}' failed after {rows_processed} rows: {source}")]
pub struct BatchError {
    pub stage: Stage,
    pub rows_processed: usize,
    #[source]
    pub source: PipelineError,
}

impl BatchError {
    pub fn new(stage: Stage, rows_processed: usize, source: PipelineError) -> Self {
        Self {
            stage,
            rows_processed,
            source,
        }
    }
}

/// Non-fatal data-quality finding recorded in the batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// A source row failed coercion and was skipped (lenient ingest)
    SkippedRow {
        file: String,
        line: usize,
        reason: String,
    },

    /// A fact row found no dimension row for one of its foreign keys
    UnmatchedForeignKey {
        dimension: TableName,
        key: String,
        sales_order: String,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::SkippedRow { file, line, reason } => {
                write!(f, "Skipped {} line {}: {}", file, line, reason)
            }
            DataQualityWarning::UnmatchedForeignKey {
                dimension,
                key,
                sales_order,
            } => write!(
                f,
                "Sales order {} has no {} row for key {}",
                sales_order, dimension, key
            ),
        }
    }
}
