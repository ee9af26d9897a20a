//! Per-unit progress summary derived from completion markers.
//!
//! Status never interprets tool output; it reads only the marker layout. A
//! unit that failed fatally is indistinguishable from one that has not run
//! yet — the absent marker is both the diagnostic signal and the resumption
//! point, so status reports progress, not verdicts.
use crate::checkpoint;
use crate::cli::StatusArgs;
use crate::unit::{self, RootPaths, Unit};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Progress snapshot for one output root.
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub output_root: String,
    pub preprocess_complete: bool,
    pub units: Vec<UnitStatus>,
}

/// Marker-derived progress for one unit.
#[derive(Debug, Serialize)]
pub struct UnitStatus {
    pub unit_id: String,
    pub unit_dir: String,
    pub state: String,
    pub resampled: bool,
    pub reconstructed_replicates: usize,
    pub no_signal: bool,
    pub aggregated: bool,
    pub selected: bool,
}

/// Build the progress snapshot for an output root.
pub fn build_status(output_root: &Path) -> Result<StatusSummary> {
    let root = RootPaths::new(output_root.to_path_buf());
    let units = if root.units_manifest().is_file() {
        unit::load_manifest(output_root)?
    } else {
        unit::discover_units(output_root)?
    };
    let unit_statuses = units.iter().map(unit_status).collect::<Result<Vec<_>>>()?;
    Ok(StatusSummary {
        output_root: output_root.display().to_string(),
        preprocess_complete: checkpoint::is_complete(&root.preprocess_marker()),
        units: unit_statuses,
    })
}

fn unit_status(unit: &Unit) -> Result<UnitStatus> {
    let paths = unit.paths();
    let resampled = checkpoint::is_complete(&paths.resample_marker());
    let reconstructed_replicates = count_replicate_markers(&paths.reconstruct_marker_dir())?;
    let no_signal = checkpoint::is_complete(&paths.no_signal_marker());
    let aggregated = checkpoint::is_complete(&paths.aggregate_marker());
    let selected = checkpoint::is_complete(&paths.select_marker());

    let state = if selected {
        "complete"
    } else if no_signal {
        "complete_no_signal"
    } else if aggregated {
        "aggregated"
    } else if reconstructed_replicates > 0 {
        "reconstructing"
    } else if resampled {
        "resampled"
    } else {
        "pending"
    };

    Ok(UnitStatus {
        unit_id: unit.id(),
        unit_dir: unit.dir.display().to_string(),
        state: state.to_string(),
        resampled,
        reconstructed_replicates,
        no_signal,
        aggregated,
        selected,
    })
}

fn count_replicate_markers(marker_dir: &Path) -> Result<usize> {
    if !marker_dir.is_dir() {
        return Ok(0);
    }
    let entries =
        fs::read_dir(marker_dir).with_context(|| format!("read {}", marker_dir.display()))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("read {}", marker_dir.display()))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("replicate_") {
            count += 1;
        }
    }
    Ok(count)
}

/// Run the `status` subcommand.
pub fn run_status(args: &StatusArgs) -> Result<()> {
    let summary = build_status(&args.output_root)?;
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize status summary")?;
        println!("{text}");
        return Ok(());
    }
    println!("output root: {}", summary.output_root);
    println!(
        "preprocess: {}",
        if summary.preprocess_complete {
            "complete"
        } else {
            "pending"
        }
    );
    if summary.units.is_empty() {
        println!("no units enumerated");
        return Ok(());
    }
    for unit in &summary.units {
        println!(
            "  {}  {}  (replicates reconstructed: {})",
            unit.unit_id, unit.state, unit.reconstructed_replicates
        );
    }
    Ok(())
}
