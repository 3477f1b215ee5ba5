//! Terminal Verifier
//!
//! The last job of every pipeline. At submission time it collects the
//! declared output paths of every task into a manifest and submits the
//! verification pass, holding on every scheduled job. The pass itself
//! checks each path on disk and leaves exactly one marker file behind:
//! `completed.txt` or `failed.txt`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use log::{error, info, warn};

use crate::error::{GraphError, SubmitError, VerifyError};
use crate::graph::{ExecutionMode, Registry, TaskId};
use crate::paths;
use crate::submit::{CommandRunner, JobHandle, Submission, Submitter};

use super::manifest::{Manifest, MANIFEST_FILE, NO_JOB};

pub const SUCCESS_MARKER: &str = "completed.txt";
pub const FAILURE_MARKER: &str = "failed.txt";

/// Job name of the verification pass.
const VERIFY_JOB: &str = "verify";

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Collected outputs of a pipeline, ready to be verified.
#[derive(Debug, Clone)]
pub struct TerminalVerifier {
    manifest: Manifest,
    holds: Vec<String>,
}

impl TerminalVerifier {
    /// Collects the declared outputs of every task except Source Nodes and
    /// `excluded`.
    pub fn new(registry: &Registry, excluded: &[TaskId]) -> Result<Self, GraphError> {
        let mut manifest = Manifest::new();
        let mut holds = BTreeSet::new();

        for task in registry.tasks() {
            if task.is_source() || excluded.contains(&task.id()) {
                continue;
            }

            let job = task.job().map(JobHandle::id).unwrap_or(NO_JOB);
            if let Some(id) = task.job().and_then(JobHandle::scheduled_id) {
                holds.insert(id.to_string());
            }

            for (_, value) in registry.declared_outputs(task.id())?.iter() {
                for path in value.items() {
                    manifest.push(job, path);
                }
            }
        }

        info!(
            "Collected {} output paths from {} scheduled jobs",
            manifest.len(),
            holds.len()
        );
        Ok(Self {
            manifest,
            holds: holds.into_iter().collect(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Scheduler job ids the verification pass waits for.
    pub fn holds(&self) -> &[String] {
        &self.holds
    }

    /// Writes the manifest into `working_dir` and submits the verification
    /// pass over it.
    pub fn submit<R: CommandRunner>(
        &self,
        working_dir: &Path,
        mode: ExecutionMode,
        submitter: &mut Submitter<R>,
    ) -> Result<JobHandle, SubmitError> {
        let manifest_path = working_dir.join(MANIFEST_FILE);
        self.manifest.write(&manifest_path)?;

        let submission = Submission {
            name: VERIFY_JOB.to_string(),
            args: vec![
                VERIFY_JOB.to_string(),
                manifest_path.to_string_lossy().into_owned(),
                "--working-dir".to_string(),
                working_dir.to_string_lossy().into_owned(),
            ],
            holds: self.holds.clone(),
            shards: None,
            mode,
            log_dir: working_dir.to_path_buf(),
        };

        submitter.submit(&submission)
    }
}

/// Result of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Paths inside the working directory that do not exist
    pub missing: Vec<PathBuf>,
    /// Paths outside the working directory, not checked
    pub skipped: Vec<PathBuf>,
    /// The marker file written
    pub marker: PathBuf,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.missing.is_empty()
    }

    /// Exit status of the verification job; the scheduler and the local
    /// driver read failure from it.
    pub fn exit_code(&self) -> ExitCode {
        if self.success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Checks every manifest path and writes the outcome marker into
/// `working_dir`. Every missing path is reported, not only the first.
pub fn verify(manifest_path: &Path, working_dir: &Path) -> Result<Outcome, VerifyError> {
    let manifest = Manifest::read(manifest_path)?;
    let root = working_dir.canonicalize().unwrap_or_else(|_| working_dir.to_path_buf());
    let root = paths::symbolic_home(&root);

    let mut missing = Vec::new();
    let mut skipped = Vec::new();
    let mut lines = Vec::new();

    for row in manifest.rows() {
        let path = paths::resolve(&row.path, &root);
        if !path.starts_with(&root) {
            lines.push(format!("[WRN] {} passed.", path.display()));
            skipped.push(path);
        } else if !path.exists() {
            error!("Missing output of job {}: {}", row.job, path.display());
            lines.push(format!("[ERR] {} doesn't exist.", path.display()));
            missing.push(path);
        }
    }

    let (marker, stale) = if missing.is_empty() {
        lines.push("Processes are completed.".to_string());
        (SUCCESS_MARKER, FAILURE_MARKER)
    } else {
        (FAILURE_MARKER, SUCCESS_MARKER)
    };
    lines.push(Local::now().format(TIMESTAMP_FORMAT).to_string());

    let marker = working_dir.join(marker);
    write_marker(&marker, &lines)?;
    remove_stale(&working_dir.join(stale))?;

    if !skipped.is_empty() {
        warn!("{} output paths outside {} were not checked", skipped.len(), root.display());
    }
    info!(
        "Verified {} outputs: {} missing ({})",
        manifest.len(),
        missing.len(),
        marker.display()
    );

    Ok(Outcome {
        missing,
        skipped,
        marker,
    })
}

fn write_marker(path: &Path, lines: &[String]) -> Result<(), VerifyError> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_stale(path: &Path) -> Result<(), VerifyError> {
    if path.exists() {
        fs::remove_file(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
