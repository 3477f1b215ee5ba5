//! Job Submitter
//!
//! Turns one task's command into a scheduler submission, a blocking local
//! run, or (in dry-run) nothing at all. Every path yields a job handle so
//! that downstream hold-lists stay well-formed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::SubmitError;
use crate::graph::ExecutionMode;

use super::job::{parse_job_id, JobHandle};
use super::runner::{CommandLine, CommandRunner, CommandOutput, SystemRunner};
use super::scheduler::{submission_command, SchedulerSettings, ShardRange};

/// One unit of work handed to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Job name, derived from the task kind
    pub name: String,
    /// Arguments to the task executable
    pub args: Vec<String>,
    /// Scheduler job ids to wait for
    pub holds: Vec<String>,
    /// Array range for array tasks
    pub shards: Option<ShardRange>,
    pub mode: ExecutionMode,
    /// Where local runs write their stdout/stderr logs
    pub log_dir: PathBuf,
}

/// Submits tasks to the scheduler or runs them locally.
#[derive(Debug)]
pub struct Submitter<R: CommandRunner = SystemRunner> {
    scheduler: SchedulerSettings,
    executable: PathBuf,
    runner: R,
    in_scheduler: bool,
    placeholders: u64,
}

impl Submitter<SystemRunner> {
    /// Creates a submitter from settings, detecting the scheduler context
    /// from the environment.
    pub fn from_settings(settings: &Settings) -> Self {
        let in_scheduler = settings.scheduler.detect_context();
        info!(
            "Scheduler context: {}",
            if in_scheduler { "present" } else { "absent (local execution)" }
        );
        Self::new(
            settings.scheduler.clone(),
            settings.executable(),
            SystemRunner,
            in_scheduler,
        )
    }
}

impl<R: CommandRunner> Submitter<R> {
    pub fn new(
        scheduler: SchedulerSettings,
        executable: impl Into<PathBuf>,
        runner: R,
        in_scheduler: bool,
    ) -> Self {
        Self {
            scheduler,
            executable: executable.into(),
            runner,
            in_scheduler,
            placeholders: 0,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn in_scheduler(&self) -> bool {
        self.in_scheduler
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Builds the command that `submit` would execute.
    pub fn command_for(&self, submission: &Submission) -> CommandLine {
        if self.in_scheduler {
            submission_command(&self.scheduler, submission, &self.executable)
        } else {
            CommandLine::new(self.executable.to_string_lossy().into_owned())
                .args(submission.args.iter().cloned())
        }
    }

    /// Submits one unit of work and returns its job handle.
    pub fn submit(&mut self, submission: &Submission) -> Result<JobHandle, SubmitError> {
        let command = self.command_for(submission);
        debug!("{}: {}", submission.name, command);

        if submission.mode.is_dry_run() {
            let handle = self.placeholder("dry");
            info!("[DRY RUN] {} -> {}", submission.name, handle);
            return Ok(handle);
        }

        if !self.in_scheduler {
            self.run_locally(submission, &command)?;
            let handle = self.placeholder("local");
            info!("{} finished locally ({})", submission.name, handle);
            return Ok(handle);
        }

        let output = self
            .runner
            .run(&command)
            .map_err(|source| SubmitError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        if !output.success() {
            return Err(SubmitError::Rejected {
                task: submission.name.clone(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let id = parse_job_id(&output.stdout)
            .ok_or_else(|| SubmitError::EmptyJobId(submission.name.clone()))?;

        info!("Job_ID: {} was submitted ({})", id, submission.name);
        Ok(JobHandle::Scheduled(id))
    }

    /// Runs the command to completion, keeping its output in log files.
    /// A non-zero exit is only reported; the output check decides success.
    fn run_locally(&mut self, submission: &Submission, command: &CommandLine) -> Result<(), SubmitError> {
        fs::create_dir_all(&submission.log_dir)?;

        let output = self
            .runner
            .run(command)
            .map_err(|source| SubmitError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        write_logs(&submission.log_dir, &submission.name, &output)?;

        if !output.success() {
            warn!(
                "{} exited with {:?}; see {}",
                submission.name,
                output.code,
                submission.log_dir.display()
            );
        }

        Ok(())
    }

    fn placeholder(&mut self, prefix: &str) -> JobHandle {
        self.placeholders += 1;
        JobHandle::Placeholder(format!("{}-{}", prefix, self.placeholders))
    }
}

/// Writes `<name>.stdout.log` and `<name>.stderr.log` into `dir`.
fn write_logs(dir: &Path, name: &str, output: &CommandOutput) -> std::io::Result<()> {
    fs::write(dir.join(format!("{}.stdout.log", name)), &output.stdout)?;
    fs::write(dir.join(format!("{}.stderr.log", name)), &output.stderr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::runner::testing::RecordingRunner;
    use tempfile::tempdir;

    fn submission(log_dir: &Path) -> Submission {
        Submission {
            name: "quant_rsem".to_string(),
            args: vec!["stage".to_string(), "quant_rsem".to_string()],
            holds: vec!["100".to_string()],
            shards: Some(ShardRange::new(2)),
            mode: ExecutionMode::Run,
            log_dir: log_dir.to_path_buf(),
        }
    }

    fn scheduler() -> SchedulerSettings {
        SchedulerSettings {
            extra_args: Vec::new(),
            ..SchedulerSettings::default()
        }
    }

    #[test]
    fn test_scheduler_submission_parses_array_id() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::answering("4243.1-2:1\n");
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", runner, true);

        let handle = submitter.submit(&submission(dir.path())).unwrap();

        assert_eq!(handle, JobHandle::Scheduled("4243".to_string()));
        let calls = &submitter.runner().calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "qsub");
        assert!(calls[0].args.contains(&"-hold_jid".to_string()));
        assert!(calls[0].args.contains(&"1-2:1".to_string()));
    }

    #[test]
    fn test_dry_run_never_calls_runner_and_handles_are_distinct() {
        let dir = tempdir().unwrap();
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", RecordingRunner::default(), true);
        let mut s = submission(dir.path());
        s.mode = ExecutionMode::DryRun;

        let first = submitter.submit(&s).unwrap();
        let second = submitter.submit(&s).unwrap();

        assert!(submitter.runner().calls.is_empty());
        assert!(!first.is_scheduled());
        assert_ne!(first, second);
    }

    #[test]
    fn test_local_run_writes_logs_and_returns_placeholder() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("quant_rsem");
        let runner = RecordingRunner::answering("done\n");
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", runner, false);

        let handle = submitter.submit(&submission(&log_dir)).unwrap();

        assert!(!handle.is_scheduled());
        let call = &submitter.runner().calls[0];
        assert_eq!(call.program, "rnaseqde");
        assert_eq!(call.args, vec!["stage", "quant_rsem"]);
        let stdout = fs::read_to_string(log_dir.join("quant_rsem.stdout.log")).unwrap();
        assert_eq!(stdout, "done\n");
        assert!(log_dir.join("quant_rsem.stderr.log").exists());
    }

    #[test]
    fn test_local_failure_is_not_a_submission_error() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::answering_each(vec![CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "tool crashed".to_string(),
        }]);
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", runner, false);

        assert!(submitter.submit(&submission(dir.path())).is_ok());
    }

    #[test]
    fn test_scheduler_rejection_is_reported() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::answering_each(vec![CommandOutput {
            code: Some(2),
            stdout: String::new(),
            stderr: "Unable to run job: denied\n".to_string(),
        }]);
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", runner, true);

        let err = submitter.submit(&submission(dir.path())).unwrap_err();
        match err {
            SubmitError::Rejected { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "Unable to run job: denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_scheduler_answer_is_an_error() {
        let dir = tempdir().unwrap();
        let mut submitter = Submitter::new(scheduler(), "rnaseqde", RecordingRunner::answering("\n"), true);

        assert!(matches!(
            submitter.submit(&submission(dir.path())),
            Err(SubmitError::EmptyJobId(_))
        ));
    }
}
