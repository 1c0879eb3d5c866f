//! Run state tracking for batch executions
//!
//! The CLI records which pipeline stages of a batch committed, so that a
//! failed run can be inspected before the batch is re-run. Re-running is
//! always safe because every stage merges idempotently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CoreResult;

/// State of a batch run in progress or finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Identifier of the batch run
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the state was last updated
    pub last_updated_at: DateTime<Utc>,

    /// Current status of the run
    pub status: RunStatus,

    /// Directory the batch read its files from
    pub source_path: String,

    /// Stages that committed
    pub completed_stages: Vec<CompletedStage>,

    /// Stage that aborted the run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<FailedStage>,

    /// Stages not yet executed
    pub pending_stages: Vec<String>,

    /// Source rows skipped by lenient ingestion
    #[serde(default)]
    pub skipped_rows: usize,

    /// Data-quality warnings raised by the run
    #[serde(default)]
    pub warnings: usize,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is currently in progress
    Running,
    /// Run completed successfully
    Completed,
    /// Run failed with errors
    Failed,
}

/// A stage that committed its writes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedStage {
    /// Stage name
    pub name: String,

    /// When the stage completed
    pub completed_at: DateTime<Utc>,

    /// How long the stage took (in milliseconds)
    pub duration_ms: u64,

    /// Rows the stage consumed
    pub rows_processed: usize,

    /// Rows inserted into the stage's table
    pub inserted: usize,

    /// Rows updated in the stage's table
    pub updated: usize,
}

/// The stage that aborted a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStage {
    /// Stage name
    pub name: String,

    /// When the stage failed
    pub failed_at: DateTime<Utc>,

    /// Rows processed before the failure
    pub rows_processed: usize,

    /// Error message
    pub error: String,
}

impl RunState {
    /// Create a new run state with every stage pending
    pub fn new(run_id: &str, source_path: &str, pending_stages: Vec<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            last_updated_at: Utc::now(),
            status: RunStatus::Running,
            source_path: source_path.to_string(),
            completed_stages: Vec::new(),
            failed_stage: None,
            pending_stages,
            skipped_rows: 0,
            warnings: 0,
        }
    }

    /// Load run state from a file path
    pub fn load(path: &Path) -> CoreResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let state: RunState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    /// Save run state to a file path atomically
    ///
    /// Uses write-to-temp-then-rename pattern to prevent corruption
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Mark a stage as completed
    pub fn mark_completed(&mut self, stage: CompletedStage) {
        self.pending_stages.retain(|n| *n != stage.name);
        self.completed_stages.push(stage);
        self.last_updated_at = Utc::now();
    }

    /// Mark a stage as failed; the run stops there
    pub fn mark_failed(&mut self, name: &str, rows_processed: usize, error: &str) {
        self.pending_stages.retain(|n| n != name);
        self.failed_stage = Some(FailedStage {
            name: name.to_string(),
            failed_at: Utc::now(),
            rows_processed,
            error: error.to_string(),
        });
        self.status = RunStatus::Failed;
        self.last_updated_at = Utc::now();
    }

    /// Mark the run as finished
    pub fn mark_run_completed(&mut self) {
        self.status = if self.failed_stage.is_none() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.last_updated_at = Utc::now();
    }

    /// Check if a stage has already been completed
    pub fn is_completed(&self, name: &str) -> bool {
        self.completed_stages.iter().any(|s| s.name == name)
    }

    /// Get summary statistics
    pub fn summary(&self) -> RunStateSummary {
        RunStateSummary {
            completed: self.completed_stages.len(),
            failed: usize::from(self.failed_stage.is_some()),
            pending: self.pending_stages.len(),
            inserted: self.completed_stages.iter().map(|s| s.inserted).sum(),
            updated: self.completed_stages.iter().map(|s| s.updated).sum(),
            total_duration_ms: self.completed_stages.iter().map(|s| s.duration_ms).sum(),
        }
    }
}

/// Summary statistics for a run state
#[derive(Debug, Clone)]
pub struct RunStateSummary {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub inserted: usize,
    pub updated: usize,
    pub total_duration_ms: u64,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
#[path = "run_state_test.rs"]
mod tests;
