//! Single-step execution: checkpoint gate, synchronous external invocation,
//! and failure classification.
//!
//! Exit-status interpretation happens here and nowhere else. The pipeline's
//! natural domain failure ("no qualifying input") is common and must not be
//! mistaken for an infrastructure fault, so the soft/fatal distinction is
//! made at this single point.
use crate::checkpoint;
use crate::stage::{Outcome, Step};
use crate::steps::StepCommand;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// One checkpointed step, ready to run.
#[derive(Debug)]
pub struct StepRun {
    pub step: Step,
    /// Unit (or unit+replicate) label for logs.
    pub subject: String,
    pub marker: PathBuf,
    pub command: StepCommand,
}

/// Run one checkpointed step for one unit or replicate.
///
/// A present marker skips invocation unconditionally. A success exit records
/// the marker before returning, and a marker write failure fails the step. A
/// spawn failure is an infrastructure error and is returned as `Err`, never
/// classified as a step outcome.
pub fn run_step(run: &StepRun) -> Result<Outcome> {
    if checkpoint::is_complete(&run.marker) {
        tracing::debug!(step = %run.step, subject = %run.subject, "checkpoint present, skipping");
        return Ok(Outcome::Skipped);
    }

    tracing::info!(step = %run.step, subject = %run.subject, command = %run.command.display(), "invoking step");
    let status = run
        .command
        .command()
        .status()
        .with_context(|| format!("spawn {}", run.command.display()))?;

    match status.code() {
        Some(0) => {
            checkpoint::mark_complete(&run.marker).with_context(|| {
                format!("record completion for {} {}", run.step, run.subject)
            })?;
            tracing::info!(step = %run.step, subject = %run.subject, "step succeeded");
            Ok(Outcome::Succeeded)
        }
        Some(code) if run.step.soft_failure_exit() == Some(code) => {
            tracing::info!(step = %run.step, subject = %run.subject, code, "step reported no usable data");
            Ok(Outcome::FailedSoft)
        }
        code => {
            tracing::error!(step = %run.step, subject = %run.subject, ?code, "step failed");
            Ok(Outcome::FailedFatal { code })
        }
    }
}
