//! Pipeline stage identity, ordering, and failure policy.
//!
//! The pipeline is a closed, ordered set of four stages; each externally
//! invoked step is bound here to its stable name and to the exit code it may
//! use to report an acceptable failure. Exit-code policy lives in this table
//! so call sites never interpret scheduler or tool exit codes themselves.
use std::fmt;

/// One of the four ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Preprocess,
    Reconstruct,
    Aggregate,
    Select,
}

impl Stage {
    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Reconstruct => "reconstruct",
            Stage::Aggregate => "aggregate",
            Stage::Select => "select",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One externally invoked, checkpointed step.
///
/// Steps are the atomic units of work the runner executes; the reconstruction
/// stage comprises the resample step (once per unit) followed by the
/// reconstruct step (once per replicate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preprocess,
    Resample,
    Reconstruct,
    Aggregate,
    Select,
}

impl Step {
    /// Stable identifier used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Preprocess => "preprocess",
            Step::Resample => "resample",
            Step::Reconstruct => "reconstruct",
            Step::Aggregate => "aggregate",
            Step::Select => "select",
        }
    }

    /// Exit code this step may use to report an acceptable failure.
    ///
    /// Only the reconstruction step defines one: exit 1 means "no usable
    /// variants for this unit" and must end the owning unit's pipeline
    /// successfully rather than propagate as an error.
    pub fn soft_failure_exit(&self) -> Option<i32> {
        match self {
            Step::Reconstruct => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting one step for one unit or replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A completion marker was already present; nothing was invoked.
    Skipped,
    /// The external step reported success and the marker was recorded.
    Succeeded,
    /// The step reported its recognized acceptable-failure signal; the
    /// owning unit's remaining pipeline must stop, successfully.
    FailedSoft,
    /// Any other non-success signal. `code` is `None` when the step was
    /// killed by a signal.
    FailedFatal { code: Option<i32> },
}

impl Outcome {
    /// True for outcomes that allow the unit to advance to the next step.
    pub fn advances(&self) -> bool {
        matches!(self, Outcome::Skipped | Outcome::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_strictly_ordered() {
        assert!(Stage::Preprocess < Stage::Reconstruct);
        assert!(Stage::Reconstruct < Stage::Aggregate);
        assert!(Stage::Aggregate < Stage::Select);
        assert_eq!(Stage::Reconstruct.as_str(), "reconstruct");
    }

    #[test]
    fn only_reconstruction_defines_a_soft_failure() {
        assert_eq!(Step::Reconstruct.soft_failure_exit(), Some(1));
        for step in [Step::Preprocess, Step::Resample, Step::Aggregate, Step::Select] {
            assert_eq!(step.soft_failure_exit(), None);
        }
    }

    #[test]
    fn outcome_advancement_policy() {
        assert!(Outcome::Skipped.advances());
        assert!(Outcome::Succeeded.advances());
        assert!(!Outcome::FailedSoft.advances());
        assert!(!Outcome::FailedFatal { code: Some(2) }.advances());
    }
}
