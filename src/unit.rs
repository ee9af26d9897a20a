//! Work-unit identity and the per-unit directory layout.
//!
//! A unit is one patient timepoint. Its directory is simultaneously its state
//! and its identity anchor: it is created when the preprocess step
//! materializes it, and the orchestrator never deletes it. Centralizing path
//! construction here keeps every stage and every remotely scheduled job
//! pointed at the same layout.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File listing every unit directory, one per line, written once after
/// preprocess and read by everything that iterates units.
const UNITS_MANIFEST: &str = "units.txt";

/// An addressable node in the work hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub patient: String,
    pub timepoint: String,
    pub dir: PathBuf,
}

impl Unit {
    /// Recover a unit from its directory path (`<root>/<patient>/<timepoint>`).
    pub fn from_dir(dir: &Path) -> Result<Unit> {
        let timepoint = component_name(dir)
            .ok_or_else(|| anyhow!("unit dir {} has no timepoint component", dir.display()))?;
        let patient = dir
            .parent()
            .and_then(component_name)
            .ok_or_else(|| anyhow!("unit dir {} has no patient component", dir.display()))?;
        Ok(Unit {
            patient,
            timepoint,
            dir: dir.to_path_buf(),
        })
    }

    /// Stable identifier derived from the unit's position in the hierarchy.
    pub fn id(&self) -> String {
        format!("{}_{}", self.patient, self.timepoint)
    }

    /// Typed paths into this unit's directory.
    pub fn paths(&self) -> UnitPaths {
        UnitPaths {
            dir: self.dir.clone(),
            patient: self.patient.clone(),
        }
    }
}

fn component_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}

/// Convenience wrapper for locating per-unit artifacts and markers.
///
/// The replicate directory naming is canonical here: the separator form
/// (`bootstrap_5`), owned by this type and used by every stage.
#[derive(Debug, Clone)]
pub struct UnitPaths {
    dir: PathBuf,
    patient: String,
}

impl UnitPaths {
    /// Return the unit directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the unit-scoped extract written by the preprocess step.
    pub fn extract_path(&self) -> PathBuf {
        self.dir.join(format!("patient_{}.csv", self.patient))
    }

    /// Return the directory holding one replicate's artifacts.
    pub fn replicate_dir(&self, replicate: u32) -> PathBuf {
        self.dir.join(format!("bootstrap_{replicate}"))
    }

    /// Return one replicate's primary variant file.
    pub fn ssm_path(&self, replicate: u32) -> PathBuf {
        self.replicate_dir(replicate)
            .join(format!("ssm_data_bootstrap_{replicate}.txt"))
    }

    /// Return one replicate's secondary copy-number file (may be empty).
    pub fn cnv_path(&self, replicate: u32) -> PathBuf {
        self.replicate_dir(replicate)
            .join(format!("cnv_data_bootstrap_{replicate}.txt"))
    }

    /// Return the aggregation output directory.
    pub fn aggregation_dir(&self) -> PathBuf {
        self.dir.join("aggregation")
    }

    /// Return the marker-selection output directory.
    pub fn markers_dir(&self) -> PathBuf {
        self.dir.join("markers")
    }

    /// Return the resample completion marker.
    pub fn resample_marker(&self) -> PathBuf {
        self.dir.join(".resample_complete")
    }

    /// Return the nested marker directory for reconstruction checkpoints.
    pub fn reconstruct_marker_dir(&self) -> PathBuf {
        self.dir.join(".reconstruct")
    }

    /// Return one replicate's reconstruction completion marker.
    pub fn replicate_marker(&self, replicate: u32) -> PathBuf {
        self.reconstruct_marker_dir()
            .join(format!("replicate_{replicate}"))
    }

    /// Return the soft-stop sentinel (reconstruction reported no usable data).
    pub fn no_signal_marker(&self) -> PathBuf {
        self.dir.join(".no_signal")
    }

    /// Return the aggregation completion marker.
    pub fn aggregate_marker(&self) -> PathBuf {
        self.dir.join(".aggregate_complete")
    }

    /// Return the marker-selection completion marker.
    pub fn select_marker(&self) -> PathBuf {
        self.dir.join(".select_complete")
    }
}

/// Typed paths into the output root shared by all units.
#[derive(Debug, Clone)]
pub struct RootPaths {
    root: PathBuf,
}

impl RootPaths {
    /// Create a new path helper rooted at the output root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the output root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the preprocess completion marker (root-scoped: preprocess
    /// materializes the units themselves).
    pub fn preprocess_marker(&self) -> PathBuf {
        self.root.join(".preprocess_complete")
    }

    /// Return the unit enumeration file.
    pub fn units_manifest(&self) -> PathBuf {
        self.root.join(UNITS_MANIFEST)
    }

    /// Return the submission report path.
    pub fn submissions_path(&self) -> PathBuf {
        self.root.join("submissions.json")
    }

    /// Return the append-only run history path.
    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.jsonl")
    }
}

/// Discover unit directories materialized by the preprocess step.
///
/// Scans two levels (`<patient>/<timepoint>`) and keeps directories that
/// contain the unit extract. Hidden entries and stray files are ignored.
/// Results are sorted for deterministic submission and manifest order.
pub fn discover_units(output_root: &Path) -> Result<Vec<Unit>> {
    let mut units = Vec::new();
    for patient_dir in sorted_subdirs(output_root)? {
        for timepoint_dir in sorted_subdirs(&patient_dir)? {
            let unit = Unit::from_dir(&timepoint_dir)?;
            if unit.paths().extract_path().is_file() {
                units.push(unit);
            }
        }
    }
    Ok(units)
}

fn sorted_subdirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(root).with_context(|| format!("read {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read {}", root.display()))?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Write the unit enumeration file atomically (temp file, then rename).
pub fn write_manifest(output_root: &Path, units: &[Unit]) -> Result<()> {
    let manifest = RootPaths::new(output_root.to_path_buf()).units_manifest();
    let mut file = tempfile::NamedTempFile::new_in(output_root)
        .with_context(|| format!("create temp file in {}", output_root.display()))?;
    for unit in units {
        writeln!(file, "{}", unit.dir.display())
            .with_context(|| format!("write {}", manifest.display()))?;
    }
    file.persist(&manifest)
        .with_context(|| format!("persist {}", manifest.display()))?;
    Ok(())
}

/// Load units from the enumeration file, preserving its order.
pub fn load_manifest(output_root: &Path) -> Result<Vec<Unit>> {
    let manifest = RootPaths::new(output_root.to_path_buf()).units_manifest();
    let text = fs::read_to_string(&manifest)
        .with_context(|| format!("read {}", manifest.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Unit::from_dir(Path::new(line.trim())))
        .collect()
}
