//! Run command implementation - loads one batch of bronze files

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use md_core::{CompletedStage, IngestMode, RunState};
use md_pipeline::{BatchReport, Pipeline, Stage, StageObserver, StageReport};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::cli::{GlobalArgs, OutputFormat, RunArgs};
use crate::commands::common::{load_config, open_store, print_table, run_state_path, ExitCode};

/// Execute the run command
pub(crate) async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let store = open_store(&config, global)?;
    let source_dir = match &args.source_dir {
        Some(dir) => PathBuf::from(dir),
        None => config.source_path_absolute(Path::new(&global.project_dir)),
    };
    let state_path = run_state_path(&config, global);

    let mut pipeline = Pipeline::new(config, store);
    if args.strict {
        pipeline = pipeline.with_mode(IngestMode::Strict);
    }
    if args.full_refresh {
        if global.verbose {
            eprintln!("[verbose] Dropping pipeline tables for full refresh");
        }
        pipeline
            .drop_tables()
            .await
            .context("Failed to drop pipeline tables")?;
    }

    let show_progress = !args.quiet && args.output == OutputFormat::Text;
    let observer = RunObserver::new(&source_dir, state_path.clone(), show_progress);
    let result = pipeline.run_batch_observed(&source_dir, &observer).await;
    let mut state = observer.finish();

    match result {
        Ok(report) => {
            state.skipped_rows = report.skipped_rows;
            state.warnings = report.warnings.len();
            state.mark_run_completed();
            state
                .save(&state_path)
                .with_context(|| format!("Failed to write {}", state_path.display()))?;

            match args.output {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&report)
                        .context("Failed to serialize batch report")?;
                    println!("{}", json);
                }
                OutputFormat::Text => print_report(&report),
            }
            Ok(())
        }
        Err(err) => {
            state.mark_failed(err.stage.name(), err.rows_processed, &err.source.to_string());
            if let Err(save_err) = state.save(&state_path) {
                log::warn!("Failed to write {}: {}", state_path.display(), save_err);
            }

            match args.output {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "run_id": state.run_id,
                        "status": state.status,
                        "failed_stage": state.failed_stage,
                        "completed_stages": state.completed_stages,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Text => {
                    eprintln!("Batch failed: {}", err);
                    eprintln!("Re-run `medallion run` to retry the batch.");
                }
            }
            Err(ExitCode(1).into())
        }
    }
}

/// Records stage completions into the run state and drives the progress bar
struct RunObserver {
    state: Mutex<RunState>,
    state_path: PathBuf,
    progress: Option<ProgressBar>,
}

impl RunObserver {
    fn new(source_dir: &Path, state_path: PathBuf, show_progress: bool) -> Self {
        let pending = Stage::ALL.iter().map(|s| s.name().to_string()).collect();
        let progress = show_progress.then(|| {
            let pb = ProgressBar::new(Stage::ALL.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        });
        Self {
            state: Mutex::new(RunState::new(
                "",
                &source_dir.display().to_string(),
                pending,
            )),
            state_path,
            progress,
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut RunState)) {
        match self.state.lock() {
            Ok(mut state) => {
                f(&mut state);
                if let Err(e) = state.save(&self.state_path) {
                    log::warn!("Failed to write {}: {}", self.state_path.display(), e);
                }
            }
            Err(_) => log::warn!("Run state lock poisoned"),
        }
    }

    fn finish(self) -> RunState {
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StageObserver for RunObserver {
    fn batch_started(&self, run_id: &str) {
        self.with_state(|state| state.run_id = run_id.to_string());
    }

    fn stage_started(&self, stage: Stage) {
        if let Some(pb) = &self.progress {
            pb.set_message(stage.name());
        }
    }

    fn stage_completed(&self, report: &StageReport) {
        self.with_state(|state| {
            state.mark_completed(CompletedStage {
                name: report.stage.name().to_string(),
                completed_at: Utc::now(),
                duration_ms: report.duration_ms,
                rows_processed: report.rows_processed,
                inserted: report.inserted,
                updated: report.updated,
            })
        });
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }
}

fn print_report(report: &BatchReport) {
    println!(
        "Batch {} read {} file(s) from {}\n",
        report.run_id, report.files, report.source_path
    );

    let rows: Vec<Vec<String>> = report
        .stages
        .iter()
        .map(|s| {
            let ids = s
                .dimension
                .and_then(|d| d.first_id.zip(d.last_id))
                .map(|(first, last)| format!("{}..{}", first, last))
                .unwrap_or_default();
            vec![
                s.stage.to_string(),
                s.rows_processed.to_string(),
                s.inserted.to_string(),
                s.updated.to_string(),
                ids,
                format!("{}ms", s.duration_ms),
            ]
        })
        .collect();
    print_table(
        &["STAGE", "ROWS", "INSERTED", "UPDATED", "NEW IDS", "TIME"],
        &rows,
    );

    if !report.warnings.is_empty() {
        println!("\nWarnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    println!(
        "\nCompleted: {} inserted, {} updated, {} skipped row(s) in {}ms",
        report.total_inserted(),
        report.total_updated(),
        report.skipped_rows,
        report.total_duration_ms()
    );
}
