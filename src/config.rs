//! Explicit pipeline configuration.
//!
//! Every component receives configuration by reference from here; nothing
//! reads ambient environment state. Program resolution happens up front so a
//! missing tool or scheduler binary is a configuration error reported before
//! any work is submitted.
use crate::cli::RunArgs;
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

/// Resolved paths to the five external step programs.
#[derive(Debug, Clone)]
pub struct ToolSet {
    pub preprocess: PathBuf,
    pub resample: PathBuf,
    pub reconstruct: PathBuf,
    pub aggregate: PathBuf,
    pub select: PathBuf,
}

/// Scheduler submission options.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub sbatch: PathBuf,
    pub partition: Option<String>,
    pub time_limit: Option<String>,
    pub cpus_per_task: Option<u32>,
    pub mem: Option<String>,
}

/// Full configuration for one `run` invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: PathBuf,
    pub output_root: PathBuf,
    pub replicates: u32,
    pub chains: u32,
    pub read_depth: u32,
    pub chunk_size: u32,
    pub tools: ToolSet,
    /// `None` in local mode: stages execute sequentially in-process.
    pub scheduler: Option<SchedulerConfig>,
    /// Path submitted jobs use to re-invoke this binary.
    pub worker_exe: PathBuf,
}

impl PipelineConfig {
    /// Assemble and validate configuration from the `run` subcommand's args.
    pub fn from_run_args(args: &RunArgs) -> Result<PipelineConfig> {
        if !args.source.is_file() {
            bail!("source record file not found: {}", args.source.display());
        }
        if !args.output_root.is_dir() {
            bail!("output root is not a directory: {}", args.output_root.display());
        }
        if args.chunk_size == 0 {
            bail!("--chunk-size must be at least 1");
        }
        if args.chains == 0 {
            bail!("--chains must be at least 1");
        }

        let tools = ToolSet {
            preprocess: resolve_program(&args.preprocess_cmd)?,
            resample: resolve_program(&args.resample_cmd)?,
            reconstruct: resolve_program(&args.reconstruct_cmd)?,
            aggregate: resolve_program(&args.aggregate_cmd)?,
            select: resolve_program(&args.select_cmd)?,
        };

        let scheduler = if args.local {
            None
        } else {
            Some(SchedulerConfig {
                sbatch: resolve_program(&args.sbatch_cmd)?,
                partition: args.partition.clone(),
                time_limit: args.time_limit.clone(),
                cpus_per_task: args.cpus_per_task,
                mem: args.mem.clone(),
            })
        };

        let worker_exe = match &args.worker_exe {
            Some(path) => path.clone(),
            None => std::env::current_exe().context("resolve current executable")?,
        };

        Ok(PipelineConfig {
            source: args.source.clone(),
            output_root: args.output_root.clone(),
            replicates: args.replicates,
            chains: args.chains,
            read_depth: args.read_depth,
            chunk_size: args.chunk_size,
            tools,
            scheduler,
            worker_exe,
        })
    }
}

/// Resolve a program given as a bare name (looked up on `PATH`) or a path.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if program.contains(std::path::MAIN_SEPARATOR) {
        if !path.is_file() {
            return Err(anyhow!("program not found: {}", path.display()));
        }
        return Ok(path.to_path_buf());
    }
    which::which(program).with_context(|| format!("program {program:?} not found on PATH"))
}
