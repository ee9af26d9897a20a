//! Top-level pipeline driving: unit enumeration, stage ordering, and job
//! chain wiring.
//!
//! The controller is single-threaded control logic. In submit mode it blocks
//! only on `sbatch` round trips and never waits for job completion; ordering
//! between stages is delegated to the scheduler's dependency graph. The same
//! per-step functions back the `--local` sequential mode and the worker
//! subcommands that submitted jobs execute.
use crate::checkpoint;
use crate::chunk::{self, Chunk};
use crate::cli::{AggregateArgs, ReconstructArgs, ResampleArgs, RunArgs, SelectArgs};
use crate::config::{self, PipelineConfig};
use crate::report::{
    self, HistoryEntry, RunMode, SubmissionReport, UnitSubmission, HISTORY_SCHEMA_VERSION,
    SUBMISSIONS_SCHEMA_VERSION,
};
use crate::runner::{self, StepRun};
use crate::scheduler::{self, JobRequest, Submitter};
use crate::stage::{Outcome, Stage, Step};
use crate::steps;
use crate::unit::{self, RootPaths, Unit};
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

/// Result of driving one unit's reconstruction chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Every replica in range reached a terminal, non-fatal outcome.
    Completed { soft_failures: u32 },
    /// A replica failed fatally; remaining replicas were not attempted.
    Fatal { replicate: u32, code: Option<i32> },
}

/// Terminal state of one unit after a local run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitEnd {
    Complete,
    /// Reconstruction reported no usable data; later stages were not run.
    SoftStopped,
    Failed(Stage),
}

/// Run the `run` subcommand.
pub fn run_pipeline_cmd(args: &RunArgs) -> Result<()> {
    let config = PipelineConfig::from_run_args(args)?;
    run_pipeline(&config)
}

/// Drive the whole pipeline: preprocess, enumerate units, then execute or
/// submit the per-unit stage chains.
pub fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let started_at_epoch_ms = report::now_epoch_ms()?;
    let root = RootPaths::new(config.output_root.clone());

    // Preprocess runs synchronously in both modes: it materializes the unit
    // directories the rest of the pipeline iterates over.
    let preprocess = StepRun {
        step: Step::Preprocess,
        subject: config.source.display().to_string(),
        marker: root.preprocess_marker(),
        command: steps::preprocess(&config.tools.preprocess, &config.source, &config.output_root),
    };
    if !runner::run_step(&preprocess)?.advances() {
        bail!("preprocess step failed for {}", config.source.display());
    }

    let units = unit::discover_units(&config.output_root)?;
    unit::write_manifest(&config.output_root, &units)?;
    if units.is_empty() {
        tracing::warn!(source = %config.source.display(), "no units materialized");
    }

    let mode = if config.scheduler.is_some() {
        RunMode::Submit
    } else {
        RunMode::Local
    };
    let failed_units = match mode {
        RunMode::Submit => {
            run_submit(config, &units)?;
            0
        }
        RunMode::Local => run_local(config, &units)?,
    };

    report::append_history(
        &config.output_root,
        &HistoryEntry {
            schema_version: HISTORY_SCHEMA_VERSION,
            started_at_epoch_ms,
            finished_at_epoch_ms: report::now_epoch_ms()?,
            mode,
            unit_count: units.len(),
            failed_units,
            success: failed_units == 0,
        },
    )?;

    if failed_units > 0 {
        bail!("{failed_units} of {} units failed", units.len());
    }
    Ok(())
}

fn run_submit(config: &PipelineConfig, units: &[Unit]) -> Result<()> {
    let options = config
        .scheduler
        .as_ref()
        .ok_or_else(|| anyhow!("scheduler configuration missing for submit mode"))?;
    let submitter = Submitter::new(options);
    let mut submissions = Vec::with_capacity(units.len());
    for unit in units {
        submissions.push(submit_unit_chain(config, &submitter, unit)?);
    }
    let report = SubmissionReport {
        schema_version: SUBMISSIONS_SCHEMA_VERSION,
        generated_at_epoch_ms: report::now_epoch_ms()?,
        source: config.source.display().to_string(),
        output_root: config.output_root.display().to_string(),
        replicates: config.replicates,
        chains: config.chains,
        chunk_size: config.chunk_size,
        read_depth: config.read_depth,
        units: submissions,
    };
    report::write_submissions(&config.output_root, &report)?;
    Ok(())
}

/// Submit one unit's job chain: resample, then the chunked reconstruction
/// array, then aggregate and select, each gated on the prior job's full
/// success via the scheduler's dependency mechanism.
fn submit_unit_chain(
    config: &PipelineConfig,
    submitter: &Submitter<'_>,
    unit: &Unit,
) -> Result<UnitSubmission> {
    let exe = path_string(&config.worker_exe)?;
    let unit_dir = path_string(&unit.dir)?;
    let unit_id = unit.id();

    let resample = submitter.submit(&JobRequest {
        name: format!("resample_{unit_id}"),
        command: vec![
            exe.clone(),
            "resample".to_string(),
            "--unit-dir".to_string(),
            unit_dir.clone(),
            "--replicates".to_string(),
            config.replicates.to_string(),
            "--resample-cmd".to_string(),
            path_string(&config.tools.resample)?,
        ],
        array_size: None,
        depends_on: None,
    })?;

    let chunk_count = chunk::chunk_count(config.replicates, config.chunk_size);
    let reconstruct = if chunk_count > 0 {
        Some(submitter.submit(&JobRequest {
            name: format!("reconstruct_{unit_id}"),
            command: vec![
                exe.clone(),
                "reconstruct".to_string(),
                "--unit-dir".to_string(),
                unit_dir.clone(),
                "--replicates".to_string(),
                config.replicates.to_string(),
                "--chains".to_string(),
                config.chains.to_string(),
                "--chunk-size".to_string(),
                config.chunk_size.to_string(),
                "--reconstruct-cmd".to_string(),
                path_string(&config.tools.reconstruct)?,
            ],
            array_size: Some(chunk_count),
            depends_on: Some(resample.id),
        })?)
    } else {
        None
    };

    let aggregate_dep = reconstruct.as_ref().map_or(resample.id, |handle| handle.id);
    let aggregate = submitter.submit(&JobRequest {
        name: format!("aggregate_{unit_id}"),
        command: vec![
            exe.clone(),
            "aggregate".to_string(),
            "--unit-dir".to_string(),
            unit_dir.clone(),
            "--replicates".to_string(),
            config.replicates.to_string(),
            "--aggregate-cmd".to_string(),
            path_string(&config.tools.aggregate)?,
        ],
        array_size: None,
        depends_on: Some(aggregate_dep),
    })?;

    let select = submitter.submit(&JobRequest {
        name: format!("select_{unit_id}"),
        command: vec![
            exe,
            "select".to_string(),
            "--unit-dir".to_string(),
            unit_dir.clone(),
            "--replicates".to_string(),
            config.replicates.to_string(),
            "--read-depth".to_string(),
            config.read_depth.to_string(),
            "--select-cmd".to_string(),
            path_string(&config.tools.select)?,
        ],
        array_size: None,
        depends_on: Some(aggregate.id),
    })?;

    Ok(UnitSubmission {
        unit_id,
        unit_dir,
        resample_job: resample.id.0,
        reconstruct_job: reconstruct.map(|handle| handle.id.0),
        chunk_count: reconstruct
            .as_ref()
            .and_then(|handle| handle.array_size)
            .unwrap_or(0),
        aggregate_job: aggregate.id.0,
        select_job: select.id.0,
    })
}

fn run_local(config: &PipelineConfig, units: &[Unit]) -> Result<usize> {
    let mut failed = 0;
    for unit in units {
        // Stage failures are contained to their unit; only infrastructure
        // errors abort the run.
        match run_unit_local(config, unit)? {
            UnitEnd::Complete => tracing::info!(unit = %unit.id(), "unit complete"),
            UnitEnd::SoftStopped => {
                tracing::info!(unit = %unit.id(), "unit complete (no usable data)");
            }
            UnitEnd::Failed(stage) => {
                tracing::error!(unit = %unit.id(), stage = %stage, "unit failed");
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn run_unit_local(config: &PipelineConfig, unit: &Unit) -> Result<UnitEnd> {
    if !run_resample(&config.tools.resample, unit, config.replicates)?.advances() {
        return Ok(UnitEnd::Failed(Stage::Reconstruct));
    }

    for chunk in chunk::plan(config.replicates, config.chunk_size) {
        match run_reconstruct_chunk(&config.tools.reconstruct, unit, &chunk, config.chains)? {
            ChunkOutcome::Completed { .. } => {}
            ChunkOutcome::Fatal { replicate, code } => {
                tracing::error!(unit = %unit.id(), replicate, ?code, "reconstruction failed");
                return Ok(UnitEnd::Failed(Stage::Reconstruct));
            }
        }
    }

    if checkpoint::is_complete(&unit.paths().no_signal_marker()) {
        return Ok(UnitEnd::SoftStopped);
    }

    if !run_aggregate(&config.tools.aggregate, unit, config.replicates)?.advances() {
        return Ok(UnitEnd::Failed(Stage::Aggregate));
    }
    if !run_select(
        &config.tools.select,
        unit,
        config.replicates,
        config.read_depth,
    )?
    .advances()
    {
        return Ok(UnitEnd::Failed(Stage::Select));
    }
    Ok(UnitEnd::Complete)
}

/// Run the resample step for one unit.
pub fn run_resample(program: &Path, unit: &Unit, replicates: u32) -> Result<Outcome> {
    runner::run_step(&StepRun {
        step: Step::Resample,
        subject: unit.id(),
        marker: unit.paths().resample_marker(),
        command: steps::resample(program, unit, replicates),
    })
}

/// Run the reconstruction step for every replicate in one chunk.
///
/// A soft failure records the unit's soft-stop sentinel and the loop
/// continues with the remaining replicas; a fatal failure stops immediately.
pub fn run_reconstruct_chunk(
    program: &Path,
    unit: &Unit,
    chunk: &Chunk,
    chains: u32,
) -> Result<ChunkOutcome> {
    let paths = unit.paths();
    let mut soft_failures = 0;
    for replicate in chunk.replicates() {
        let outcome = runner::run_step(&StepRun {
            step: Step::Reconstruct,
            subject: format!("{} replicate {replicate}", unit.id()),
            marker: paths.replicate_marker(replicate),
            command: steps::reconstruct(program, unit, replicate, chains),
        })?;
        match outcome {
            Outcome::Skipped | Outcome::Succeeded => {}
            Outcome::FailedSoft => {
                checkpoint::mark_complete(&paths.no_signal_marker())
                    .with_context(|| format!("record soft stop for {}", unit.id()))?;
                soft_failures += 1;
            }
            Outcome::FailedFatal { code } => {
                return Ok(ChunkOutcome::Fatal { replicate, code });
            }
        }
    }
    Ok(ChunkOutcome::Completed { soft_failures })
}

/// Run the aggregation step for one unit over its completed replicates.
///
/// A soft-stopped unit is terminal: the external step is not invoked and no
/// marker is written, but the call reports no work rather than an error.
pub fn run_aggregate(program: &Path, unit: &Unit, replicates: u32) -> Result<Outcome> {
    let paths = unit.paths();
    if checkpoint::is_complete(&paths.no_signal_marker()) {
        tracing::info!(unit = %unit.id(), "unit stopped on no usable data; skipping aggregation");
        return Ok(Outcome::Skipped);
    }
    let completed = checkpoint::completed_replicates(&paths, replicates);
    runner::run_step(&StepRun {
        step: Step::Aggregate,
        subject: unit.id(),
        marker: paths.aggregate_marker(),
        command: steps::aggregate(program, unit, &completed),
    })
}

/// Run the marker-selection step for one unit over its completed replicates.
pub fn run_select(program: &Path, unit: &Unit, replicates: u32, read_depth: u32) -> Result<Outcome> {
    let paths = unit.paths();
    if checkpoint::is_complete(&paths.no_signal_marker()) {
        tracing::info!(unit = %unit.id(), "unit stopped on no usable data; skipping marker selection");
        return Ok(Outcome::Skipped);
    }
    let completed = checkpoint::completed_replicates(&paths, replicates);
    runner::run_step(&StepRun {
        step: Step::Select,
        subject: unit.id(),
        marker: paths.select_marker(),
        command: steps::select(program, unit, &completed, read_depth),
    })
}

/// Run the `resample` worker subcommand.
pub fn worker_resample(args: &ResampleArgs) -> Result<()> {
    let unit = worker_unit(&args.unit_dir)?;
    let program = config::resolve_program(&args.resample_cmd)?;
    let outcome = run_resample(&program, &unit, args.replicates)?;
    ensure_advanced(outcome, Step::Resample, &unit)
}

/// Run the `reconstruct` worker subcommand for one chunk.
pub fn worker_reconstruct(args: &ReconstructArgs) -> Result<()> {
    let unit = worker_unit(&args.unit_dir)?;
    let program = config::resolve_program(&args.reconstruct_cmd)?;
    let index = resolve_chunk_index(args.chunk_index)?;
    let chunk = chunk::chunk_at(args.replicates, args.chunk_size, index).ok_or_else(|| {
        anyhow!(
            "chunk index {index} is out of range for {} replicates in chunks of {}",
            args.replicates,
            args.chunk_size
        )
    })?;
    match run_reconstruct_chunk(&program, &unit, &chunk, args.chains)? {
        ChunkOutcome::Completed { soft_failures } => {
            if soft_failures > 0 {
                tracing::info!(
                    unit = %unit.id(),
                    soft_failures,
                    "chunk finished with soft-failed replicates"
                );
            }
            Ok(())
        }
        ChunkOutcome::Fatal { replicate, code } => bail!(
            "reconstruct failed for unit {} replicate {replicate} (exit {code:?})",
            unit.id()
        ),
    }
}

/// Run the `aggregate` worker subcommand.
pub fn worker_aggregate(args: &AggregateArgs) -> Result<()> {
    let unit = worker_unit(&args.unit_dir)?;
    let program = config::resolve_program(&args.aggregate_cmd)?;
    let outcome = run_aggregate(&program, &unit, args.replicates)?;
    ensure_advanced(outcome, Step::Aggregate, &unit)
}

/// Run the `select` worker subcommand.
pub fn worker_select(args: &SelectArgs) -> Result<()> {
    let unit = worker_unit(&args.unit_dir)?;
    let program = config::resolve_program(&args.select_cmd)?;
    let outcome = run_select(&program, &unit, args.replicates, args.read_depth)?;
    ensure_advanced(outcome, Step::Select, &unit)
}

fn path_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(|text| text.to_string())
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))
}

fn worker_unit(unit_dir: &Path) -> Result<Unit> {
    if !unit_dir.is_dir() {
        bail!("unit directory not found: {}", unit_dir.display());
    }
    Unit::from_dir(unit_dir)
}

fn ensure_advanced(outcome: Outcome, step: Step, unit: &Unit) -> Result<()> {
    if outcome.advances() {
        Ok(())
    } else {
        bail!("{step} failed for unit {}", unit.id())
    }
}

fn resolve_chunk_index(explicit: Option<u32>) -> Result<u32> {
    if let Some(index) = explicit {
        return Ok(index);
    }
    let raw = std::env::var(scheduler::ARRAY_INDEX_ENV).with_context(|| {
        format!(
            "chunk index missing: pass --chunk-index or set {}",
            scheduler::ARRAY_INDEX_ENV
        )
    })?;
    raw.trim()
        .parse::<u32>()
        .with_context(|| format!("parse {} value {raw:?}", scheduler::ARRAY_INDEX_ENV))
}
