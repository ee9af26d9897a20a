//! Typed job submission to the batch scheduler.
//!
//! The controller never polls: ordering between stages is expressed as
//! dependency edges (`afterok`) that the scheduler enforces, and the handle
//! returned here exists only to build those edges. Submission failure is an
//! infrastructure error and is always surfaced.
use crate::config::SchedulerConfig;
use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::process::Command;

/// Environment variable carrying the array task ordinal on the remote side.
pub const ARRAY_INDEX_ENV: &str = "SLURM_ARRAY_TASK_ID";

/// Scheduler-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for an accepted submission, used solely for dependency chaining.
#[derive(Debug, Clone, Copy)]
pub struct JobHandle {
    pub id: JobId,
    /// Array cardinality for chunked submissions.
    pub array_size: Option<u32>,
}

/// One logical unit of work to submit.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub name: String,
    /// Command line executed by each constituent job.
    pub command: Vec<String>,
    /// Requests `n` independent executions differentiated only by the array
    /// task ordinal the scheduler injects into the environment.
    pub array_size: Option<u32>,
    /// The scheduler starts this job only after every constituent execution
    /// of the referenced job has succeeded.
    pub depends_on: Option<JobId>,
}

/// Submits jobs through the configured `sbatch` command.
pub struct Submitter<'a> {
    options: &'a SchedulerConfig,
}

impl<'a> Submitter<'a> {
    pub fn new(options: &'a SchedulerConfig) -> Self {
        Self { options }
    }

    /// Submit one job and return its handle.
    pub fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        let args = sbatch_args(self.options, request)?;
        let output = Command::new(&self.options.sbatch)
            .args(&args)
            .output()
            .with_context(|| format!("spawn {}", self.options.sbatch.display()))?;
        if !output.status.success() {
            bail!(
                "sbatch rejected job {:?}: {}",
                request.name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let id = parse_job_id(&String::from_utf8_lossy(&output.stdout))?;
        tracing::info!(job = %id, name = %request.name, "submitted");
        Ok(JobHandle {
            id,
            array_size: request.array_size,
        })
    }
}

/// Build the `sbatch` argument list for a request.
///
/// Kept pure so tests can assert on the exact submission arguments without a
/// scheduler present.
pub fn sbatch_args(options: &SchedulerConfig, request: &JobRequest) -> Result<Vec<String>> {
    let mut args = vec![
        "--parsable".to_string(),
        format!("--job-name={}", request.name),
    ];
    if let Some(partition) = &options.partition {
        args.push(format!("--partition={partition}"));
    }
    if let Some(time_limit) = &options.time_limit {
        args.push(format!("--time={time_limit}"));
    }
    if let Some(cpus) = options.cpus_per_task {
        args.push(format!("--cpus-per-task={cpus}"));
    }
    if let Some(mem) = &options.mem {
        args.push(format!("--mem={mem}"));
    }
    if let Some(size) = request.array_size {
        if size == 0 {
            bail!("array size must be positive for job {:?}", request.name);
        }
        args.push(format!("--array=0-{}", size - 1));
    }
    if let Some(dependency) = request.depends_on {
        args.push(format!("--dependency=afterok:{dependency}"));
    }
    if request.command.is_empty() {
        bail!("empty command for job {:?}", request.name);
    }
    let wrapped = shell_words::join(&request.command);
    args.push(format!("--wrap={wrapped}"));
    Ok(args)
}

/// Parse the job id from `sbatch --parsable` output (`<id>` or `<id>;<cluster>`).
fn parse_job_id(stdout: &str) -> Result<JobId> {
    let field = stdout
        .trim()
        .split(';')
        .next()
        .ok_or_else(|| anyhow!("empty sbatch output"))?;
    let id = field
        .parse::<u64>()
        .with_context(|| format!("parse sbatch job id from {stdout:?}"))?;
    Ok(JobId(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options() -> SchedulerConfig {
        SchedulerConfig {
            sbatch: PathBuf::from("/usr/bin/sbatch"),
            partition: Some("general".to_string()),
            time_limit: Some("24:00:00".to_string()),
            cpus_per_task: Some(4),
            mem: Some("8G".to_string()),
        }
    }

    #[test]
    fn array_and_dependency_flags_are_emitted() {
        let request = JobRequest {
            name: "reconstruct_p1_baseline".to_string(),
            command: vec!["pflow".to_string(), "reconstruct".to_string()],
            array_size: Some(3),
            depends_on: Some(JobId(4242)),
        };
        let args = sbatch_args(&options(), &request).expect("build args");
        assert!(args.contains(&"--array=0-2".to_string()));
        assert!(args.contains(&"--dependency=afterok:4242".to_string()));
        assert!(args.contains(&"--partition=general".to_string()));
        assert_eq!(args.last().expect("wrap arg"), "--wrap=pflow reconstruct");
    }

    #[test]
    fn wrap_quotes_arguments_with_spaces() {
        let request = JobRequest {
            name: "aggregate".to_string(),
            command: vec![
                "pflow".to_string(),
                "aggregate".to_string(),
                "--unit-dir".to_string(),
                "/data/p 1/t1".to_string(),
            ],
            array_size: None,
            depends_on: None,
        };
        let args = sbatch_args(&options(), &request).expect("build args");
        let wrap = args.last().expect("wrap arg");
        assert_eq!(wrap, "--wrap=pflow aggregate --unit-dir '/data/p 1/t1'");
    }

    #[test]
    fn zero_cardinality_arrays_are_rejected() {
        let request = JobRequest {
            name: "reconstruct".to_string(),
            command: vec!["pflow".to_string()],
            array_size: Some(0),
            depends_on: None,
        };
        assert!(sbatch_args(&options(), &request).is_err());
    }

    #[test]
    fn job_ids_parse_with_and_without_cluster_suffix() {
        assert_eq!(parse_job_id("123\n").expect("plain id"), JobId(123));
        assert_eq!(parse_job_id("123;cluster0").expect("cluster id"), JobId(123));
        assert!(parse_job_id("Submitted batch job 123").is_err());
        assert!(parse_job_id("").is_err());
    }
}
