//! Batch Scheduler Protocol
//!
//! Builds Grid Engine style submission commands:
//!
//! ```text
//! qsub -V -terse -N <name> [-hold_jid <id,id>] [-t 1-<n>:1] <extra> <program> <args>
//! ```

use std::env;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::runner::CommandLine;
use super::submitter::Submission;

/// How to reach the scheduler and how it talks to jobs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Submission program
    pub program: String,
    /// Variable whose presence means "running under the scheduler"
    pub context_var: String,
    /// Variable carrying the 1-based shard index inside array jobs
    pub shard_var: String,
    /// Appended to every submission before the job command
    pub extra_args: Vec<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            program: "qsub".to_string(),
            context_var: "SGE_TASK_ID".to_string(),
            shard_var: "SGE_TASK_ID".to_string(),
            extra_args: ["-cwd", "-b", "y", "-o", "ugelogs/", "-e", "ugelogs/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SchedulerSettings {
    /// Returns true if this process runs inside a scheduler-assigned context.
    pub fn detect_context(&self) -> bool {
        env::var_os(&self.context_var).is_some()
    }
}

/// Inclusive shard range of an array job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    pub first: usize,
    pub last: usize,
    pub step: usize,
}

impl ShardRange {
    /// Range `1..=count` with step 1.
    pub fn new(count: usize) -> Self {
        Self {
            first: 1,
            last: count,
            step: 1,
        }
    }

    pub fn len(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            (self.last - self.first) / self.step + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ShardRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}:{}", self.first, self.last, self.step)
    }
}

/// Builds the scheduler submission command for `submission`.
pub fn submission_command(
    settings: &SchedulerSettings,
    submission: &Submission,
    executable: &Path,
) -> CommandLine {
    let mut command = CommandLine::new(&settings.program)
        .arg("-V")
        .arg("-terse")
        .args(["-N", submission.name.as_str()]);

    if !submission.holds.is_empty() {
        command = command.args(["-hold_jid".to_string(), submission.holds.join(",")]);
    }

    if let Some(range) = submission.shards {
        command = command.args(["-t".to_string(), range.to_string()]);
    }

    command
        .args(settings.extra_args.iter().cloned())
        .arg(executable.to_string_lossy().into_owned())
        .args(submission.args.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ExecutionMode;
    use std::path::PathBuf;

    fn submission() -> Submission {
        Submission {
            name: "align_star".to_string(),
            args: vec!["stage".to_string(), "align_star".to_string()],
            holds: Vec::new(),
            shards: None,
            mode: ExecutionMode::Run,
            log_dir: PathBuf::from("out"),
        }
    }

    fn bare_settings() -> SchedulerSettings {
        SchedulerSettings {
            extra_args: Vec::new(),
            ..SchedulerSettings::default()
        }
    }

    #[test]
    fn test_shard_range_display() {
        assert_eq!(ShardRange::new(2).to_string(), "1-2:1");
        assert_eq!(ShardRange::new(5).len(), 5);
        assert!(ShardRange::new(0).is_empty());
    }

    #[test]
    fn test_single_job_without_holds() {
        let cmd = submission_command(&bare_settings(), &submission(), Path::new("/bin/rnaseqde"));
        assert_eq!(
            cmd.to_string(),
            "qsub -V -terse -N align_star /bin/rnaseqde stage align_star"
        );
    }

    #[test]
    fn test_array_job_with_holds() {
        let mut s = submission();
        s.holds = vec!["11".to_string(), "12".to_string()];
        s.shards = Some(ShardRange::new(3));

        let cmd = submission_command(&bare_settings(), &s, Path::new("rnaseqde"));
        assert_eq!(
            cmd.args,
            vec![
                "-V", "-terse", "-N", "align_star", "-hold_jid", "11,12", "-t", "1-3:1",
                "rnaseqde", "stage", "align_star"
            ]
        );
    }

    #[test]
    fn test_extra_args_precede_executable() {
        let cmd = submission_command(&SchedulerSettings::default(), &submission(), Path::new("rnaseqde"));
        let exe = cmd.args.iter().position(|a| a == "rnaseqde").unwrap();
        let binary_flag = cmd.args.iter().position(|a| a == "-b").unwrap();
        assert!(binary_flag < exe);
    }

    #[test]
    fn test_settings_yaml_defaults_missing_fields() {
        let settings: SchedulerSettings = serde_yaml::from_str("program: /opt/uge/bin/qsub\n").unwrap();
        assert_eq!(settings.program, "/opt/uge/bin/qsub");
        assert_eq!(settings.shard_var, "SGE_TASK_ID");
    }
}
