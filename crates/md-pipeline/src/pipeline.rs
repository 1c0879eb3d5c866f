//! Batch orchestrator
//!
//! Runs the stages of one batch strictly in order. Each stage's writes
//! are committed before the next stage reads them; the first failure
//! stops the batch and leaves earlier stages' writes in place. Because
//! every merge is idempotent, re-running the same batch is the recovery
//! path.

use chrono::{DateTime, Utc};
use md_core::{
    Config, ConformedRecord, IngestMode, MergeCallSite, Row, TableRecord, TableSchema,
};
use md_db::TableStore;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::dimension::{Dimension, DimensionOutcome};
use crate::enrich::{Clock, Enricher, SystemClock};
use crate::error::{BatchError, DataQualityWarning, PipelineError, PipelineResult};
use crate::fact::{build_facts, merge_facts};
use crate::ingest::{RawReader, SourceRow};
use crate::merge::{Catalog, MergeOutcome, MergeSpec};

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Ingest,
    Enrich,
    SilverMerge,
    DateDimension,
    CustomerDimension,
    ProductDimension,
    FactBuild,
    FactMerge,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Ingest,
        Stage::Enrich,
        Stage::SilverMerge,
        Stage::DateDimension,
        Stage::CustomerDimension,
        Stage::ProductDimension,
        Stage::FactBuild,
        Stage::FactMerge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Enrich => "enrich",
            Stage::SilverMerge => "silver-merge",
            Stage::DateDimension => "date-dimension",
            Stage::CustomerDimension => "customer-dimension",
            Stage::ProductDimension => "product-dimension",
            Stage::FactBuild => "fact-build",
            Stage::FactMerge => "fact-merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts and timing of one completed stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub duration_ms: u64,
    /// Set for the three dimension stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<DimensionOutcome>,
}

/// Summary of a successful batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub source_path: String,
    pub started_at: DateTime<Utc>,
    pub files: usize,
    pub stages: Vec<StageReport>,
    /// Rows dropped by lenient ingestion
    pub skipped_rows: usize,
    pub warnings: Vec<DataQualityWarning>,
}

impl BatchReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn total_inserted(&self) -> usize {
        self.stages.iter().map(|s| s.inserted).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.stages.iter().map(|s| s.updated).sum()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.duration_ms).sum()
    }
}

/// Receives stage progress while a batch runs
pub trait StageObserver: Send + Sync {
    fn batch_started(&self, _run_id: &str) {}
    fn stage_started(&self, _stage: Stage) {}
    fn stage_completed(&self, _report: &StageReport) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Runs batches against one catalog
pub struct Pipeline {
    config: Config,
    catalog: Catalog,
    enricher: Enricher,
    mode: IngestMode,
}

struct StageTimer {
    stage: Stage,
    started: Instant,
}

impl StageTimer {
    fn start(stage: Stage, observer: &dyn StageObserver) -> Self {
        log::info!("Stage {} started", stage);
        observer.stage_started(stage);
        Self {
            stage,
            started: Instant::now(),
        }
    }

    fn finish(self, rows_processed: usize, merge: Option<MergeOutcome>) -> StageReport {
        let merge = merge.unwrap_or_default();
        let report = StageReport {
            stage: self.stage,
            rows_processed,
            inserted: merge.inserted,
            updated: merge.updated,
            duration_ms: self.started.elapsed().as_millis() as u64,
            dimension: None,
        };
        log::info!(
            "Stage {} completed: {} rows, {} inserted, {} updated ({} ms)",
            report.stage,
            report.rows_processed,
            report.inserted,
            report.updated,
            report.duration_ms
        );
        report
    }
}

impl Pipeline {
    pub fn new(config: Config, store: Arc<dyn TableStore>) -> Self {
        let enricher = Enricher::new(config.cutoff_date, Arc::new(SystemClock));
        let mode = config.source.mode;
        Self {
            config,
            catalog: Catalog::new(store),
            enricher,
            mode,
        }
    }

    /// Replace the enrichment clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.enricher = Enricher::new(self.config.cutoff_date, clock);
        self
    }

    /// Override the configured coercion failure policy
    pub fn with_mode(mut self, mode: IngestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create the five pipeline tables if they do not exist
    pub async fn ensure_tables(&self) -> PipelineResult<()> {
        for site in MergeCallSite::ALL {
            self.catalog
                .ensure_table(self.config.tables.get(site), &site.table_schema())
                .await?;
        }
        Ok(())
    }

    /// Drop the five pipeline tables
    pub async fn drop_tables(&self) -> PipelineResult<()> {
        for site in MergeCallSite::ALL {
            let table = self.config.tables.get(site);
            log::info!("Dropping {}", table);
            self.catalog.store().drop_if_exists(table).await?;
        }
        Ok(())
    }

    /// Run one batch over the files in `source_dir`
    pub async fn run_batch(&self, source_dir: &Path) -> Result<BatchReport, BatchError> {
        self.run_batch_observed(source_dir, &NoopObserver).await
    }

    /// Run one batch, reporting stage progress to `observer`
    pub async fn run_batch_observed(
        &self,
        source_dir: &Path,
        observer: &dyn StageObserver,
    ) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            source_path: source_dir.display().to_string(),
            started_at: Utc::now(),
            files: 0,
            stages: Vec::with_capacity(Stage::ALL.len()),
            skipped_rows: 0,
            warnings: Vec::new(),
        };
        log::info!(
            "Batch {} reading {} ({} mode)",
            report.run_id,
            report.source_path,
            self.mode
        );
        observer.batch_started(&report.run_id);

        let completed = |stage: StageReport, report: &mut BatchReport| {
            observer.stage_completed(&stage);
            report.stages.push(stage);
        };

        // ingest
        let timer = StageTimer::start(Stage::Ingest, observer);
        self.ensure_tables()
            .await
            .map_err(|e| BatchError::new(Stage::Ingest, 0, e))?;
        let source_rows = self.ingest(source_dir, &mut report)?;
        let processed = source_rows.len() + report.skipped_rows;
        completed(timer.finish(processed, None), &mut report);

        // enrich
        let timer = StageTimer::start(Stage::Enrich, observer);
        let mut conformed = Vec::with_capacity(source_rows.len());
        for (i, source) in source_rows.iter().enumerate() {
            let record = self
                .enricher
                .enrich_row(source)
                .map_err(|e| BatchError::new(Stage::Enrich, i, e))?;
            conformed.push(record);
        }
        completed(timer.finish(conformed.len(), None), &mut report);

        // silver-merge
        let timer = StageTimer::start(Stage::SilverMerge, observer);
        let rows: Vec<Row> = conformed.iter().map(ConformedRecord::to_row).collect();
        let merged = self
            .merge(MergeCallSite::Silver, rows)
            .await
            .map_err(|e| BatchError::new(Stage::SilverMerge, 0, e))?;
        completed(timer.finish(conformed.len(), Some(merged)), &mut report);

        // dimensions read the whole silver table, not just this batch
        let timer = StageTimer::start(Stage::DateDimension, observer);
        let silver = self
            .read_silver()
            .await
            .map_err(|e| BatchError::new(Stage::DateDimension, 0, e))?;
        let date = self
            .build_dimension(Dimension::Date, Stage::DateDimension, &silver)
            .await?;
        completed(dimension_report(timer, silver.len(), date), &mut report);

        if self.config.parallel_dimensions {
            let customer_timer = StageTimer::start(Stage::CustomerDimension, observer);
            let product_timer = StageTimer::start(Stage::ProductDimension, observer);
            let (customer, product) = tokio::try_join!(
                self.build_dimension(Dimension::Customer, Stage::CustomerDimension, &silver),
                self.build_dimension(Dimension::Product, Stage::ProductDimension, &silver),
            )?;
            completed(
                dimension_report(customer_timer, silver.len(), customer),
                &mut report,
            );
            completed(
                dimension_report(product_timer, silver.len(), product),
                &mut report,
            );
        } else {
            let timer = StageTimer::start(Stage::CustomerDimension, observer);
            let customer = self
                .build_dimension(Dimension::Customer, Stage::CustomerDimension, &silver)
                .await?;
            completed(dimension_report(timer, silver.len(), customer), &mut report);

            let timer = StageTimer::start(Stage::ProductDimension, observer);
            let product = self
                .build_dimension(Dimension::Product, Stage::ProductDimension, &silver)
                .await?;
            completed(dimension_report(timer, silver.len(), product), &mut report);
        }

        // fact-build
        let timer = StageTimer::start(Stage::FactBuild, observer);
        let facts = build_facts(&self.catalog, &self.config, &silver)
            .await
            .map_err(|e| BatchError::new(Stage::FactBuild, 0, e))?;
        report.warnings.extend(facts.warnings);
        completed(timer.finish(silver.len(), None), &mut report);

        // fact-merge
        let timer = StageTimer::start(Stage::FactMerge, observer);
        let merged = merge_facts(&self.catalog, &self.config, &facts.rows)
            .await
            .map_err(|e| BatchError::new(Stage::FactMerge, 0, e))?;
        completed(timer.finish(facts.rows.len(), Some(merged)), &mut report);

        log::info!(
            "Batch {} finished: {} inserted, {} updated, {} skipped rows, {} warnings",
            report.run_id,
            report.total_inserted(),
            report.total_updated(),
            report.skipped_rows,
            report.warnings.len()
        );
        Ok(report)
    }

    fn ingest(
        &self,
        source_dir: &Path,
        report: &mut BatchReport,
    ) -> Result<Vec<SourceRow>, BatchError> {
        let reader = RawReader::open(source_dir, &self.config.source)
            .map_err(|e| BatchError::new(Stage::Ingest, 0, e))?;
        report.files = reader.file_count();

        let mut rows = Vec::new();
        for result in reader {
            match result {
                Ok(row) => rows.push(row),
                Err(PipelineError::SchemaMismatch {
                    file,
                    line,
                    column,
                    value,
                    expected,
                }) if self.mode == IngestMode::Lenient => {
                    let warning = DataQualityWarning::SkippedRow {
                        file,
                        line,
                        reason: format!("cannot read '{}' as {} in {}", value, expected, column),
                    };
                    log::warn!("{}", warning);
                    report.skipped_rows += 1;
                    report.warnings.push(warning);
                }
                Err(e) => {
                    return Err(BatchError::new(
                        Stage::Ingest,
                        rows.len() + report.skipped_rows,
                        e,
                    ))
                }
            }
        }
        Ok(rows)
    }

    async fn merge(&self, site: MergeCallSite, rows: Vec<Row>) -> PipelineResult<MergeOutcome> {
        let schema = site.table_schema();
        let spec = MergeSpec {
            table: self.config.tables.get(site),
            schema: &schema,
            match_keys: self.config.merge_keys.get(site),
            update_columns: self.config.update_columns.get(site),
        };
        self.catalog.upsert(&spec, rows).await
    }

    async fn read_silver(&self) -> PipelineResult<Vec<ConformedRecord>> {
        let table = &self.config.tables.silver;
        let schema: TableSchema = ConformedRecord::table_schema();
        let rows = self.catalog.scan(table, &schema).await?;
        rows.iter()
            .map(|r| ConformedRecord::from_row(table.as_str(), r))
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn build_dimension(
        &self,
        dimension: Dimension,
        stage: Stage,
        silver: &[ConformedRecord],
    ) -> Result<DimensionOutcome, BatchError> {
        dimension
            .build(&self.catalog, &self.config, silver)
            .await
            .map_err(|e| BatchError::new(stage, 0, e))
    }
}

fn dimension_report(timer: StageTimer, rows: usize, outcome: DimensionOutcome) -> StageReport {
    let mut report = timer.finish(rows, Some(outcome.merge));
    report.dimension = Some(outcome);
    report
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
