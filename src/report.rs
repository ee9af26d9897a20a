//! Persisted orchestration reports.
//!
//! `submissions.json` is a snapshot of the jobs created by a submit-mode run;
//! `history.jsonl` is an append-only log of orchestrator runs. Both are
//! schema-versioned so later tooling can detect drift.
use crate::unit::RootPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current schema version for `submissions.json`.
pub const SUBMISSIONS_SCHEMA_VERSION: u32 = 1;
/// Current schema version for `history.jsonl`.
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Snapshot of one submit-mode run.
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmissionReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub source: String,
    pub output_root: String,
    pub replicates: u32,
    pub chains: u32,
    pub chunk_size: u32,
    pub read_depth: u32,
    pub units: Vec<UnitSubmission>,
}

/// Job chain created for one unit.
#[derive(Debug, Deserialize, Serialize)]
pub struct UnitSubmission {
    pub unit_id: String,
    pub unit_dir: String,
    pub resample_job: u64,
    /// Absent when the replicate count is zero and no array job was needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruct_job: Option<u64>,
    pub chunk_count: u32,
    pub aggregate_job: u64,
    pub select_job: u64,
}

/// Execution mode recorded in history entries.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Local,
    Submit,
}

/// One appended line per orchestrator run.
#[derive(Debug, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub schema_version: u32,
    pub started_at_epoch_ms: u128,
    pub finished_at_epoch_ms: u128,
    pub mode: RunMode,
    pub unit_count: usize,
    pub failed_units: usize,
    pub success: bool,
}

/// Write the submission report snapshot.
pub fn write_submissions(output_root: &Path, report: &SubmissionReport) -> Result<()> {
    let path = RootPaths::new(output_root.to_path_buf()).submissions_path();
    let text = serde_json::to_string_pretty(report).context("serialize submission report")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Append a history entry as JSONL.
pub fn append_history(output_root: &Path, entry: &HistoryEntry) -> Result<()> {
    let path = RootPaths::new(output_root.to_path_buf()).history_path();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize history entry")?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Current epoch time in milliseconds for artifact timestamps.
pub fn now_epoch_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("compute timestamp")?
        .as_millis())
}
