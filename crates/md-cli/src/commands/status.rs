//! Status command implementation - shows the last run state

use anyhow::{Context, Result};
use md_core::{RunState, RunStatus};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{load_config, print_table, run_state_path};

/// Execute the status command
pub(crate) async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let path = run_state_path(&config, global);
    let Some(state) = RunState::load(&path)
        .with_context(|| format!("Failed to read run state from {}", path.display()))?
    else {
        println!("No runs recorded yet ({} not found)", path.display());
        return Ok(());
    };

    if args.output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let summary = state.summary();
    println!("Run {} ({})", state.run_id, state.status);
    println!("  source:  {}", state.source_path);
    println!("  started: {}", state.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "  updated: {}",
        state.last_updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} completed, {} failed, {} pending; {} inserted, {} updated in {}ms",
        summary.completed,
        summary.failed,
        summary.pending,
        summary.inserted,
        summary.updated,
        summary.total_duration_ms
    );
    if state.skipped_rows > 0 || state.warnings > 0 {
        println!(
            "  {} skipped row(s), {} warning(s)",
            state.skipped_rows, state.warnings
        );
    }
    println!();

    let rows: Vec<Vec<String>> = state
        .completed_stages
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                "ok".to_string(),
                s.rows_processed.to_string(),
                s.inserted.to_string(),
                s.updated.to_string(),
            ]
        })
        .chain(state.failed_stage.iter().map(|f| {
            vec![
                f.name.clone(),
                "failed".to_string(),
                f.rows_processed.to_string(),
                "-".to_string(),
                "-".to_string(),
            ]
        }))
        .chain(state.pending_stages.iter().map(|name| {
            vec![
                name.clone(),
                "pending".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]
        }))
        .collect();
    print_table(&["STAGE", "STATUS", "ROWS", "INSERTED", "UPDATED"], &rows);

    if let Some(failed) = &state.failed_stage {
        println!("\nError in {}: {}", failed.name, failed.error);
    }
    if state.status == RunStatus::Running {
        println!("\nThe run did not finish; re-run `medallion run` to complete the batch.");
    }

    Ok(())
}
