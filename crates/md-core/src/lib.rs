//! md-core - Core library for Medallion
//!
//! This crate provides the typed records of every pipeline layer, the
//! dynamic row representation the storage layer works with, project
//! configuration and run-state tracking used across all Medallion
//! components.

pub mod config;
pub mod error;
pub mod record;
pub mod run_state;
pub mod schema;
pub(crate) mod serde_helpers;
pub mod table_name;
pub mod value;

pub use config::{Config, IngestMode, MergeCallSite};
pub use error::{CoreError, CoreResult};
pub use record::{
    ConformedRecord, CustomerDimRow, DateDimRow, FactRow, ProductDimRow, RawRecord, TableRecord,
};
pub use run_state::{CompletedStage, FailedStage, RunState, RunStateSummary, RunStatus};
pub use schema::{ColumnDef, ColumnType, TableSchema};
pub use table_name::TableName;
pub use value::{Row, RowKey, Value};
