//! Argument contracts for the five external step programs.
//!
//! The tools are opaque: the orchestrator owns only their argument lists,
//! exit codes, and output locations. Builders are kept pure so tests can
//! assert on the exact argv a step receives.
use crate::unit::Unit;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// A fully built external step invocation.
#[derive(Debug, Clone)]
pub struct StepCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl StepCommand {
    /// Build the process command for synchronous execution.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Render the invocation for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

fn step_command(program: &Path, args: Vec<OsString>) -> StepCommand {
    StepCommand {
        program: program.as_os_str().to_os_string(),
        args,
    }
}

/// Preprocess invocation: derive unit directories from the source file.
pub fn preprocess(program: &Path, source: &Path, output_root: &Path) -> StepCommand {
    step_command(
        program,
        vec![
            OsString::from("--input"),
            source.into(),
            OsString::from("--output"),
            output_root.into(),
        ],
    )
}

/// Resample invocation: materialize one unit's bootstrap replicates.
pub fn resample(program: &Path, unit: &Unit, replicates: u32) -> StepCommand {
    let paths = unit.paths();
    step_command(
        program,
        vec![
            OsString::from("--input"),
            paths.extract_path().into(),
            OsString::from("--output"),
            paths.dir().into(),
            OsString::from("--num-bootstraps"),
            replicates.to_string().into(),
        ],
    )
}

/// Reconstruction invocation for one replicate.
pub fn reconstruct(program: &Path, unit: &Unit, replicate: u32, chains: u32) -> StepCommand {
    let paths = unit.paths();
    step_command(
        program,
        vec![
            OsString::from("--ssm"),
            paths.ssm_path(replicate).into(),
            OsString::from("--cnv"),
            paths.cnv_path(replicate).into(),
            OsString::from("--num-chains"),
            chains.to_string().into(),
            OsString::from("--seed"),
            reconstruction_seed(replicate, chains).to_string().into(),
            OsString::from("--output"),
            paths.replicate_dir(replicate).into(),
        ],
    )
}

/// Aggregation invocation over the completed replicate list.
pub fn aggregate(program: &Path, unit: &Unit, completed: &[u32]) -> StepCommand {
    let paths = unit.paths();
    let mut args = vec![
        OsString::from("--patient"),
        unit.id().into(),
        OsString::from("--bootstrap-list"),
    ];
    args.extend(completed.iter().map(|replicate| replicate.to_string().into()));
    args.push(OsString::from("--base-dir"));
    args.push(paths.dir().into());
    args.push(OsString::from("--output"));
    args.push(paths.aggregation_dir().into());
    step_command(program, args)
}

/// Marker-selection invocation over the completed replicate list.
pub fn select(program: &Path, unit: &Unit, completed: &[u32], read_depth: u32) -> StepCommand {
    let paths = unit.paths();
    let mut args = vec![
        OsString::from("--patient"),
        unit.id().into(),
        OsString::from("--bootstrap-list"),
    ];
    args.extend(completed.iter().map(|replicate| replicate.to_string().into()));
    args.push(OsString::from("--read-depth"));
    args.push(read_depth.to_string().into());
    args.push(OsString::from("--base-dir"));
    args.push(paths.dir().into());
    args.push(OsString::from("--output"));
    args.push(paths.markers_dir().into());
    step_command(program, args)
}

/// Base seed for one replicate's chain set.
///
/// The reconstruction tool offsets per chain, so the pair
/// `(replicate_index, chain_index)` maps to a distinct seed with no
/// collisions across replicates.
pub fn reconstruction_seed(replicate: u32, chains: u32) -> u64 {
    u64::from(replicate) * u64::from(chains.max(1))
}
