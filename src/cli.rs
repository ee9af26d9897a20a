//! CLI argument parsing for the pipeline orchestrator.
//!
//! The CLI is intentionally thin: `run` is the submission-side entry point,
//! and the four worker subcommands are what submitted jobs execute on the
//! remote side. Every parameter a worker needs travels in its argument list;
//! nothing is read from ambient configuration.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default program name for the preprocess step.
pub const DEFAULT_PREPROCESS_CMD: &str = "process_records";
/// Default program name for the resample/bootstrap step.
pub const DEFAULT_RESAMPLE_CMD: &str = "bootstrap_records";
/// Default program name for the per-replicate reconstruction step.
pub const DEFAULT_RECONSTRUCT_CMD: &str = "run_phylowgs";
/// Default program name for the aggregation step.
pub const DEFAULT_AGGREGATE_CMD: &str = "aggregate_trees";
/// Default program name for the marker-selection step.
pub const DEFAULT_SELECT_CMD: &str = "select_markers";
/// Default scheduler submission command.
pub const DEFAULT_SBATCH_CMD: &str = "sbatch";

/// Root CLI entrypoint for the pipeline orchestrator.
#[derive(Parser, Debug)]
#[command(
    name = "pflow",
    version,
    about = "Checkpointed batch-scheduler orchestrator for bootstrapped phylogenetic pipelines",
    after_help = "Commands:\n  run --source <FILE> --output-root <DIR>   Preprocess, enumerate units, submit job chains\n  resample --unit-dir <DIR>                 Worker: materialize bootstrap replicates for one unit\n  reconstruct --unit-dir <DIR>              Worker: reconstruct one chunk of replicates\n  aggregate --unit-dir <DIR>                Worker: aggregate completed replicates\n  select --unit-dir <DIR>                   Worker: select markers from aggregated trees\n  status --output-root <DIR>                Summarize per-unit progress from markers\n\nExamples:\n  pflow run --source cohort.csv --output-root /data --replicates 100 --chunk-size 10\n  pflow run --source cohort.csv --output-root /tmp/out --local\n  pflow status --output-root /data --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Resample(ResampleArgs),
    Reconstruct(ReconstructArgs),
    Aggregate(AggregateArgs),
    Select(SelectArgs),
    Status(StatusArgs),
}

/// Run command inputs: the whole-pipeline submission entry point.
#[derive(Parser, Debug)]
#[command(about = "Preprocess the source file, enumerate units, and submit per-unit job chains")]
pub struct RunArgs {
    /// Raw consolidated record file (one row per observation)
    #[arg(long, value_name = "FILE")]
    pub source: PathBuf,

    /// Output root under which unit directories are materialized
    #[arg(long, value_name = "DIR")]
    pub output_root: PathBuf,

    /// Number of bootstrap replicates per unit
    #[arg(long, default_value_t = 100)]
    pub replicates: u32,

    /// Number of chains per reconstruction
    #[arg(long, default_value_t = 5)]
    pub chains: u32,

    /// Target read depth for marker selection
    #[arg(long, default_value_t = 1500)]
    pub read_depth: u32,

    /// Maximum replicates per scheduled chunk
    #[arg(long, default_value_t = 10)]
    pub chunk_size: u32,

    /// Execute all stages sequentially in-process instead of submitting jobs
    #[arg(long)]
    pub local: bool,

    /// Preprocess step program (name on PATH or explicit path)
    #[arg(long, value_name = "CMD", default_value = DEFAULT_PREPROCESS_CMD)]
    pub preprocess_cmd: String,

    /// Resample step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_RESAMPLE_CMD)]
    pub resample_cmd: String,

    /// Reconstruction step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_RECONSTRUCT_CMD)]
    pub reconstruct_cmd: String,

    /// Aggregation step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_AGGREGATE_CMD)]
    pub aggregate_cmd: String,

    /// Marker-selection step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_SELECT_CMD)]
    pub select_cmd: String,

    /// Scheduler submission command
    #[arg(long, value_name = "CMD", default_value = DEFAULT_SBATCH_CMD)]
    pub sbatch_cmd: String,

    /// Scheduler partition for submitted jobs
    #[arg(long, value_name = "NAME")]
    pub partition: Option<String>,

    /// Wall-clock limit for submitted jobs (scheduler format, e.g. 24:00:00)
    #[arg(long, value_name = "LIMIT")]
    pub time_limit: Option<String>,

    /// CPUs per submitted task
    #[arg(long, value_name = "N")]
    pub cpus_per_task: Option<u32>,

    /// Memory per submitted task (scheduler format, e.g. 8G)
    #[arg(long, value_name = "SIZE")]
    pub mem: Option<String>,

    /// Executable submitted jobs should run (defaults to this binary)
    #[arg(long, value_name = "PATH")]
    pub worker_exe: Option<PathBuf>,
}

/// Resample worker inputs for one unit.
#[derive(Parser, Debug)]
#[command(about = "Materialize bootstrap replicates for one unit (worker side)")]
pub struct ResampleArgs {
    /// Unit directory (`<root>/<patient>/<timepoint>`)
    #[arg(long, value_name = "DIR")]
    pub unit_dir: PathBuf,

    /// Number of bootstrap replicates to materialize
    #[arg(long)]
    pub replicates: u32,

    /// Resample step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_RESAMPLE_CMD)]
    pub resample_cmd: String,
}

/// Reconstruct worker inputs for one chunk of one unit.
#[derive(Parser, Debug)]
#[command(about = "Reconstruct one chunk of a unit's replicates (worker side)")]
pub struct ReconstructArgs {
    /// Unit directory (`<root>/<patient>/<timepoint>`)
    #[arg(long, value_name = "DIR")]
    pub unit_dir: PathBuf,

    /// Total number of bootstrap replicates for the unit
    #[arg(long)]
    pub replicates: u32,

    /// Number of chains per reconstruction
    #[arg(long, default_value_t = 5)]
    pub chains: u32,

    /// Maximum replicates per scheduled chunk
    #[arg(long, default_value_t = 10)]
    pub chunk_size: u32,

    /// Zero-based chunk index (falls back to the scheduler's array task id)
    #[arg(long, value_name = "I")]
    pub chunk_index: Option<u32>,

    /// Reconstruction step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_RECONSTRUCT_CMD)]
    pub reconstruct_cmd: String,
}

/// Aggregate worker inputs for one unit.
#[derive(Parser, Debug)]
#[command(about = "Aggregate a unit's completed replicates (worker side)")]
pub struct AggregateArgs {
    /// Unit directory (`<root>/<patient>/<timepoint>`)
    #[arg(long, value_name = "DIR")]
    pub unit_dir: PathBuf,

    /// Total number of bootstrap replicates for the unit
    #[arg(long)]
    pub replicates: u32,

    /// Aggregation step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_AGGREGATE_CMD)]
    pub aggregate_cmd: String,
}

/// Select worker inputs for one unit.
#[derive(Parser, Debug)]
#[command(about = "Select markers from a unit's aggregated trees (worker side)")]
pub struct SelectArgs {
    /// Unit directory (`<root>/<patient>/<timepoint>`)
    #[arg(long, value_name = "DIR")]
    pub unit_dir: PathBuf,

    /// Total number of bootstrap replicates for the unit
    #[arg(long)]
    pub replicates: u32,

    /// Target read depth for marker selection
    #[arg(long, default_value_t = 1500)]
    pub read_depth: u32,

    /// Marker-selection step program
    #[arg(long, value_name = "CMD", default_value = DEFAULT_SELECT_CMD)]
    pub select_cmd: String,
}

/// Status command inputs.
#[derive(Parser, Debug)]
#[command(about = "Summarize per-unit progress derived from completion markers")]
pub struct StatusArgs {
    /// Output root previously used by `run`
    #[arg(long, value_name = "DIR")]
    pub output_root: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
