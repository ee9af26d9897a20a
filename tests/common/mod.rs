//! Shared test infrastructure for integration tests.
//!
//! External steps and the scheduler are replaced by stub shell scripts that
//! record their invocations to per-tool logs and honor scripted exit codes,
//! so tests can assert on exactly what the orchestrator invoked.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Temp workspace for one test: output root, stub tools, and their logs.
pub struct Fixture {
    temp: TempDir,
    pub root: PathBuf,
    pub tools: PathBuf,
    pub logs: PathBuf,
    pub source: PathBuf,
}

/// Create a fixture with an output root and a small source record file.
pub fn fixture() -> Fixture {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = temp.path().join("out");
    let tools = temp.path().join("tools");
    let logs = temp.path().join("logs");
    for dir in [&root, &tools, &logs] {
        fs::create_dir_all(dir).expect("create fixture dir");
    }
    let source = temp.path().join("cohort.csv");
    fs::write(&source, "patient,timepoint,vaf\np1,baseline,0.4\n").expect("write source");
    Fixture {
        temp,
        root,
        tools,
        logs,
        source,
    }
}

/// Stub programs standing in for the five external steps.
pub struct StubSet {
    pub preprocess: PathBuf,
    pub resample: PathBuf,
    pub reconstruct: PathBuf,
    pub aggregate: PathBuf,
    pub select: PathBuf,
}

impl Fixture {
    /// Path of a stub tool's invocation log.
    pub fn log(&self, name: &str) -> PathBuf {
        self.logs.join(format!("{name}.log"))
    }

    /// Write an executable shell script into the tools directory.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.tools.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    /// Preprocess stub: materializes one `<patient>/baseline` unit per name.
    pub fn stub_preprocess(&self, patients: &[&str]) -> PathBuf {
        let mut body = String::from(
            "while [ $# -gt 0 ]; do case \"$1\" in --output) out=\"$2\"; shift 2 ;; *) shift ;; esac; done\n",
        );
        body.push_str(&format!("echo run >> \"{}\"\n", self.log("preprocess").display()));
        for patient in patients {
            body.push_str(&format!("mkdir -p \"$out/{patient}/baseline\"\n"));
            body.push_str(&format!(
                "printf 'id,vaf\\n' > \"$out/{patient}/baseline/patient_{patient}.csv\"\n"
            ));
        }
        self.script("process_records", &body)
    }

    /// Resample stub: materializes `bootstrap_<i>` replicate directories.
    pub fn stub_resample(&self) -> PathBuf {
        let body = format!(
            "while [ $# -gt 0 ]; do case \"$1\" in --output) out=\"$2\"; shift 2 ;; --num-bootstraps) n=\"$2\"; shift 2 ;; *) shift ;; esac; done\n\
             echo run >> \"{log}\"\n\
             i=1\n\
             while [ \"$i\" -le \"$n\" ]; do\n\
             mkdir -p \"$out/bootstrap_$i\"\n\
             printf 'data\\n' > \"$out/bootstrap_$i/ssm_data_bootstrap_$i.txt\"\n\
             : > \"$out/bootstrap_$i/cnv_data_bootstrap_$i.txt\"\n\
             i=$((i+1))\n\
             done",
            log = self.log("resample").display()
        );
        self.script("bootstrap_records", &body)
    }

    /// Reconstruct stub: logs the primary file path, runs `extra` (scripted
    /// exit codes), then writes a result artifact and succeeds.
    pub fn stub_reconstruct(&self, extra: &str) -> PathBuf {
        let body = format!(
            "while [ $# -gt 0 ]; do case \"$1\" in --ssm) ssm=\"$2\"; shift 2 ;; --output) out=\"$2\"; shift 2 ;; *) shift ;; esac; done\n\
             echo \"$ssm\" >> \"{log}\"\n\
             {extra}\n\
             mkdir -p \"$out\"\n\
             printf 'tree\\n' > \"$out/result.summ.json.gz\"",
            log = self.log("reconstruct").display()
        );
        self.script("run_phylowgs", &body)
    }

    /// Aggregate stub: logs its full argv and writes an artifact.
    pub fn stub_aggregate(&self) -> PathBuf {
        let body = format!(
            "printf '%s\\n' \"$*\" >> \"{log}\"\n\
             while [ $# -gt 0 ]; do case \"$1\" in --output) out=\"$2\"; shift 2 ;; *) shift ;; esac; done\n\
             mkdir -p \"$out\"\n\
             printf 'summary\\n' > \"$out/bootstrap_summary.pkl\"",
            log = self.log("aggregate").display()
        );
        self.script("aggregate_trees", &body)
    }

    /// Select stub: logs its full argv and writes a results report.
    pub fn stub_select(&self) -> PathBuf {
        let body = format!(
            "printf '%s\\n' \"$*\" >> \"{log}\"\n\
             while [ $# -gt 0 ]; do case \"$1\" in --output) out=\"$2\"; shift 2 ;; *) shift ;; esac; done\n\
             mkdir -p \"$out\"\n\
             printf 'markers\\n' > \"$out/marker_selection_results.txt\"",
            log = self.log("select").display()
        );
        self.script("select_markers", &body)
    }

    /// Fake `sbatch`: records each submission's argv and prints sequential
    /// job ids starting at 101, `--parsable` style.
    pub fn stub_sbatch(&self) -> PathBuf {
        let body = format!(
            "printf '%s\\n' \"$*\" >> \"{log}\"\n\
             n=$(cat \"{next}\" 2>/dev/null || echo 100)\n\
             n=$((n+1))\n\
             echo \"$n\" > \"{next}\"\n\
             echo \"$n\"",
            log = self.log("sbatch").display(),
            next = self.logs.join("sbatch_next").display()
        );
        self.script("sbatch", &body)
    }

    /// The full default stub set with an always-succeeding reconstruction.
    pub fn default_stubs(&self, patients: &[&str]) -> StubSet {
        StubSet {
            preprocess: self.stub_preprocess(patients),
            resample: self.stub_resample(),
            reconstruct: self.stub_reconstruct(""),
            aggregate: self.stub_aggregate(),
            select: self.stub_select(),
        }
    }

    /// Argument list for a `run` invocation against the stub tools.
    pub fn run_args(&self, stubs: &StubSet, replicates: u32, chunk_size: u32) -> Vec<String> {
        vec![
            "run".to_string(),
            "--source".to_string(),
            self.source.display().to_string(),
            "--output-root".to_string(),
            self.root.display().to_string(),
            "--replicates".to_string(),
            replicates.to_string(),
            "--chains".to_string(),
            "2".to_string(),
            "--chunk-size".to_string(),
            chunk_size.to_string(),
            "--preprocess-cmd".to_string(),
            stubs.preprocess.display().to_string(),
            "--resample-cmd".to_string(),
            stubs.resample.display().to_string(),
            "--reconstruct-cmd".to_string(),
            stubs.reconstruct.display().to_string(),
            "--aggregate-cmd".to_string(),
            stubs.aggregate.display().to_string(),
            "--select-cmd".to_string(),
            stubs.select.display().to_string(),
        ]
    }

    /// Unit directory for a patient's baseline timepoint.
    pub fn unit_dir(&self, patient: &str) -> PathBuf {
        self.root.join(patient).join("baseline")
    }
}

/// Run the orchestrator binary with the given arguments.
pub fn run_pflow<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_pflow"))
        .args(args)
        .output()
        .expect("run pflow")
}

/// Run the orchestrator binary with extra environment variables set.
pub fn run_pflow_env<I, S>(args: I, envs: &[(&str, &str)]) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(env!("CARGO_BIN_EXE_pflow"));
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("run pflow")
}

/// Count the lines of a stub tool's invocation log (zero if absent).
pub fn invocation_count(log: &Path) -> usize {
    fs::read_to_string(log)
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

/// Assert a run succeeded, printing its stderr on failure.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success, stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
