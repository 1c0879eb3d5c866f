//! md-db - Storage layer for Medallion
//!
//! This crate provides the `TableStore` trait and its implementations
//! for DuckDB and for process memory.

pub mod duckdb;
pub mod error;
pub mod memory;
pub mod traits;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use traits::{ApplyOutcome, ChangeSet, RowUpdate, TableStore};
