//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use md_core::Config;
use md_db::{DuckDbBackend, TableStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Empty: the command already reported the failure to the user.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Run state file name inside the target directory
pub(crate) const RUN_STATE_FILE: &str = "run_state.json";

/// Load the project configuration from `--config` or the project directory.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    match &global.config {
        Some(path) => Config::load(Path::new(path)).context("Failed to load configuration file"),
        None => Config::load_from_dir(Path::new(&global.project_dir))
            .context("Failed to load project configuration"),
    }
}

/// Database path after applying `--target`, relative to the project directory.
pub(crate) fn database_path(config: &Config, global: &GlobalArgs) -> String {
    let path = global.target.as_deref().unwrap_or(&config.database.path);
    if path == ":memory:" || Path::new(path).is_absolute() {
        return path.to_string();
    }
    Path::new(&global.project_dir)
        .join(path)
        .display()
        .to_string()
}

/// Open the configured DuckDB database.
pub(crate) fn open_store(config: &Config, global: &GlobalArgs) -> Result<Arc<dyn TableStore>> {
    let path = database_path(config, global);
    let store: Arc<dyn TableStore> =
        Arc::new(DuckDbBackend::new(&path).context("Failed to connect to database")?);
    if global.verbose {
        eprintln!("[verbose] Opened {} database {}", store.db_type(), path);
    }
    Ok(store)
}

/// Location of the run state file for this project.
pub(crate) fn run_state_path(config: &Config, global: &GlobalArgs) -> PathBuf {
    config
        .target_path_absolute(Path::new(&global.project_dir))
        .join(RUN_STATE_FILE)
}

/// Calculate column widths for a table given headers and row data.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  "));

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  "));
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
