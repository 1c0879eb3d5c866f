//! md-pipeline - Batch pipeline for Medallion
//!
//! This crate moves one batch of bronze files through the silver table
//! into the gold star schema: raw ingest, enrichment, the keyed merge
//! primitive, dimension and fact builders, and the orchestrator that
//! runs them in order.

pub mod dimension;
pub mod enrich;
pub mod error;
pub mod fact;
pub mod ingest;
pub mod merge;
pub mod pipeline;

pub use dimension::{Dimension, DimensionOutcome, DimensionSpec};
pub use enrich::{Clock, Enricher, FixedClock, SystemClock, UNKNOWN_CUSTOMER};
pub use error::{BatchError, DataQualityWarning, PipelineError, PipelineResult};
pub use fact::{DimensionLookup, FactBuild};
pub use ingest::{RawReader, SourceRow};
pub use merge::{Catalog, MergeOutcome, MergePlan, MergeSpec};
pub use pipeline::{BatchReport, NoopObserver, Pipeline, Stage, StageObserver, StageReport};
