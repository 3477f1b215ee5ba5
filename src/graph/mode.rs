//! Execution Modes and Stage Plans
//!
//! Whether a task is really submitted is decided once by the driver, per
//! stage kind, and passed into each task at construction.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::info;

use crate::error::ConfigError;

/// How a task is handled at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Submit to the scheduler, or run locally outside a scheduler
    #[default]
    Run,
    /// Log the command only and fabricate a placeholder job handle
    DryRun,
}

impl ExecutionMode {
    pub fn is_dry_run(self) -> bool {
        self == ExecutionMode::DryRun
    }
}

/// Coarse pipeline phases used by step-by-step and resume requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Align,
    Quant,
    De,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Align, Step::Quant, Step::De];
}

impl FromStr for Step {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "align" => Ok(Step::Align),
            "quant" => Ok(Step::Quant),
            "de" => Ok(Step::De),
            other => Err(ConfigError::UnknownStep(other.to_string())),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Align => "align",
            Step::Quant => "quant",
            Step::De => "de",
        };
        f.write_str(name)
    }
}

/// Per-stage execution modes computed from the driver's request.
#[derive(Debug, Clone, Default)]
pub struct StagePlan {
    dry_run: bool,
    only: Option<Step>,
    resume_from: Option<Step>,
    steps: HashMap<&'static str, Step>,
}

impl StagePlan {
    /// Creates a plan over stage kinds grouped into steps.
    pub fn new(steps: &[(Step, &[&'static str])]) -> Self {
        let steps = steps
            .iter()
            .flat_map(|(step, kinds)| kinds.iter().map(move |kind| (*kind, *step)))
            .collect();
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Dry-runs every stage.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs only the stages of `step`.
    pub fn step_by_step(mut self, step: Option<Step>) -> Self {
        self.only = step;
        self
    }

    /// Dry-runs every stage of the steps before `step`.
    pub fn resume_from(mut self, step: Option<Step>) -> Self {
        self.resume_from = step;
        self
    }

    /// Mode for a stage kind. Kinds outside any step (the verification
    /// pass) follow the global flag, and are dry-run when only one step runs.
    pub fn mode_for(&self, kind: &str) -> ExecutionMode {
        if self.dry_run {
            return ExecutionMode::DryRun;
        }

        let Some(step) = self.steps.get(kind).copied() else {
            return if self.only.is_some() {
                ExecutionMode::DryRun
            } else {
                ExecutionMode::Run
            };
        };

        if let Some(only) = self.only {
            if step != only {
                return ExecutionMode::DryRun;
            }
        }

        if let Some(resume) = self.resume_from {
            if step < resume {
                return ExecutionMode::DryRun;
            }
        }

        ExecutionMode::Run
    }

    /// Logs the resulting mode of every stage kind.
    pub fn log_summary(&self) {
        let mut kinds: Vec<_> = self.steps.iter().collect();
        kinds.sort_by_key(|(kind, step)| (**step, **kind));
        for (kind, step) in kinds {
            info!("  [{}] {} -> {:?}", step, kind, self.mode_for(kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> StagePlan {
        StagePlan::new(&[
            (Step::Align, &["align_star"]),
            (Step::Quant, &["quant_rsem", "conv_rsem2mat"]),
            (Step::De, &["de_ebseq"]),
        ])
    }

    #[test]
    fn test_default_plan_runs_everything() {
        let plan = plan();
        for kind in ["align_star", "quant_rsem", "conv_rsem2mat", "de_ebseq"] {
            assert_eq!(plan.mode_for(kind), ExecutionMode::Run);
        }
    }

    #[test]
    fn test_global_dry_run() {
        let plan = plan().dry_run(true);
        assert_eq!(plan.mode_for("align_star"), ExecutionMode::DryRun);
        assert_eq!(plan.mode_for("unlisted"), ExecutionMode::DryRun);
    }

    #[test]
    fn test_step_by_step_runs_only_one_step() {
        let plan = plan().step_by_step(Some(Step::Quant));
        assert_eq!(plan.mode_for("align_star"), ExecutionMode::DryRun);
        assert_eq!(plan.mode_for("quant_rsem"), ExecutionMode::Run);
        assert_eq!(plan.mode_for("conv_rsem2mat"), ExecutionMode::Run);
        assert_eq!(plan.mode_for("de_ebseq"), ExecutionMode::DryRun);
    }

    #[test]
    fn test_step_by_step_dry_runs_kinds_outside_steps() {
        let stepped = plan().step_by_step(Some(Step::Align));
        assert_eq!(stepped.mode_for("align_star"), ExecutionMode::Run);
        assert_eq!(stepped.mode_for("verify"), ExecutionMode::DryRun);

        let resumed = plan().resume_from(Some(Step::Quant));
        assert_eq!(resumed.mode_for("verify"), ExecutionMode::Run);
    }

    #[test]
    fn test_resume_from_skips_earlier_steps() {
        let plan = plan().resume_from(Some(Step::De));
        assert_eq!(plan.mode_for("align_star"), ExecutionMode::DryRun);
        assert_eq!(plan.mode_for("quant_rsem"), ExecutionMode::DryRun);
        assert_eq!(plan.mode_for("de_ebseq"), ExecutionMode::Run);
    }

    #[test]
    fn test_step_parsing() {
        assert_eq!("quant".parse::<Step>().unwrap(), Step::Quant);
        assert!("polish".parse::<Step>().is_err());
        assert_eq!(Step::De.to_string(), "de");
    }
}
