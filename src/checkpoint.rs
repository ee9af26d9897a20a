//! Durable completion markers.
//!
//! A marker is an empty sentinel file whose presence alone records that a
//! step completed; content is never read. Markers are never cleared by the
//! orchestrator — manual removal is the only retry-from-scratch mechanism.
//! Writes are create-if-absent, so two racing executions of the same step
//! cannot corrupt state; the worst outcome is redundant work.
use crate::unit::UnitPaths;
use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::path::Path;

/// True when the marker for a completed step is present.
pub fn is_complete(marker: &Path) -> bool {
    marker.exists()
}

/// Record a completed step by creating its sentinel marker.
///
/// The marker and its parent directory are synced before returning. A failed
/// write must fail the owning stage: an unrecorded completion would either
/// re-execute forever or be mistaken for one on the next run.
pub fn mark_complete(marker: &Path) -> Result<()> {
    let parent = marker
        .parent()
        .ok_or_else(|| anyhow!("marker {} has no parent directory", marker.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let file =
        File::create(marker).with_context(|| format!("create marker {}", marker.display()))?;
    file.sync_all()
        .with_context(|| format!("sync marker {}", marker.display()))?;
    let dir = File::open(parent).with_context(|| format!("open {}", parent.display()))?;
    dir.sync_all()
        .with_context(|| format!("sync {}", parent.display()))?;
    Ok(())
}

/// Replicate indices in `1..=n` whose reconstruction markers are present.
///
/// This is the completed-replicate list consumed by the aggregation and
/// marker-selection steps; a soft-failed replicate is simply absent.
pub fn completed_replicates(paths: &UnitPaths, n: u32) -> Vec<u32> {
    (1..=n)
        .filter(|replicate| is_complete(&paths.replicate_marker(*replicate)))
        .collect()
}
