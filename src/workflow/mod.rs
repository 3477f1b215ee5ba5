//! Workflow Drivers
//!
//! A driver turns a sample sheet and a reference selection into a task
//! graph, submits every task in construction order and finishes with the
//! Terminal Verifier.
//!
//! - [`star_rsem_ebseq`]: STAR, RSEM and EBSeq
//! - [`hisat2_stringtie`]: HISAT2 and StringTie

pub mod hisat2_stringtie;
pub mod star_rsem_ebseq;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;

use crate::config::{Assets, Layout, SampleSheet, Settings, Strandness};
use crate::error::{ConfigError, GraphError, WorkflowError};
use crate::graph::{ExecutionMode, Registry, Stage, StagePlan, Step, TaskId, TaskOptions};
use crate::submit::{CommandRunner, JobHandle, SubmissionRecord, Submitter};
use crate::verify::{TerminalVerifier, FAILURE_MARKER, SUCCESS_MARKER};

/// Reference used when none is requested.
pub const DEFAULT_REFERENCE: &str = "grch38";

/// Assets file used when none is requested.
pub const DEFAULT_ASSETS: &str = "config/assets.yml";

/// Job name of the verification pass, as seen in step plans.
const VERIFY_KIND: &str = "verify";

/// A supported pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipeline {
    #[default]
    StarRsemEbseq,
    Hisat2Stringtie,
}

impl Pipeline {
    pub const ALL: [Pipeline; 2] = [Pipeline::StarRsemEbseq, Pipeline::Hisat2Stringtie];

    /// Stage kinds of each step.
    pub fn steps(self) -> &'static [(Step, &'static [&'static str])] {
        match self {
            Pipeline::StarRsemEbseq => star_rsem_ebseq::STEPS,
            Pipeline::Hisat2Stringtie => hisat2_stringtie::STEPS,
        }
    }

    /// Queues the pipeline's stage tasks below `sources`.
    pub fn build(self, registry: &mut Registry, sources: &[TaskId], plan: &StagePlan) -> Result<Vec<TaskId>, GraphError> {
        match self {
            Pipeline::StarRsemEbseq => star_rsem_ebseq::build(registry, sources, plan),
            Pipeline::Hisat2Stringtie => hisat2_stringtie::build(registry, sources, plan),
        }
    }
}

impl FromStr for Pipeline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "star-rsem-ebseq" => Ok(Pipeline::StarRsemEbseq),
            "hisat2-stringtie" => Ok(Pipeline::Hisat2Stringtie),
            other => Err(ConfigError::UnknownWorkflow(other.to_string())),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::StarRsemEbseq => f.write_str("star-rsem-ebseq"),
            Pipeline::Hisat2Stringtie => f.write_str("hisat2-stringtie"),
        }
    }
}

/// Everything a driver run is asked to do.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub pipeline: Pipeline,
    pub sample_sheet: PathBuf,
    pub layout: Layout,
    pub strandness: Strandness,
    pub reference: String,
    /// Only this annotation; every annotation of the reference when unset
    pub annotation: Option<String>,
    pub assets: PathBuf,
    /// Directory the task output directories are relative to
    pub working_dir: PathBuf,
    pub dry_run: bool,
    pub step_by_step: Option<Step>,
    pub resume_from: Option<Step>,
}

impl RunRequest {
    pub fn new(sample_sheet: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: Pipeline::default(),
            sample_sheet: sample_sheet.into(),
            layout: Layout::default(),
            strandness: Strandness::default(),
            reference: DEFAULT_REFERENCE.to_string(),
            annotation: None,
            assets: PathBuf::from(DEFAULT_ASSETS),
            working_dir: working_dir.into(),
            dry_run: false,
            step_by_step: None,
            resume_from: None,
        }
    }

    /// Execution modes of every stage kind of the requested pipeline.
    pub fn plan(&self) -> StagePlan {
        StagePlan::new(self.pipeline.steps())
            .dry_run(self.dry_run)
            .step_by_step(self.step_by_step)
            .resume_from(self.resume_from)
    }
}

/// What a driver run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tasks: usize,
    pub submitted: usize,
    pub verifier: JobHandle,
    pub record: PathBuf,
    /// Outcome of a verification pass that already ran in this process
    /// tree; `None` while it is still queued or was dry-run.
    pub verified: Option<bool>,
}

/// Registers a stage task in the mode the plan assigns to its kind.
pub(crate) fn add_stage(
    registry: &mut Registry,
    stage: &'static dyn Stage,
    required: &[TaskId],
    plan: &StagePlan,
) -> Result<TaskId, GraphError> {
    let options = TaskOptions::new().mode(plan.mode_for(stage.name()));
    registry.add_task_with(stage, required, options)
}

/// Registers one Source Node per selected annotation, each exposing the
/// sample sheet, the run options and the annotation's assets.
fn add_sources(
    registry: &mut Registry,
    request: &RunRequest,
    sheet: &SampleSheet,
    assets: &Assets,
) -> Result<Vec<TaskId>, WorkflowError> {
    let annotations = assets.annotations(&request.reference, request.annotation.as_deref())?;
    if annotations.is_empty() {
        return Err(WorkflowError::NoAnnotations(request.reference.clone()));
    }

    let mut sources = Vec::with_capacity(annotations.len());
    for (name, values) in annotations {
        let mut seed = sheet.to_value_map();
        seed.insert("strandness", request.strandness.to_string());
        seed.insert("sample-sheet", request.sample_sheet.to_string_lossy().into_owned());
        seed.merge(&values);
        info!("Annotation {}: {} assets", name, values.len());
        sources.push(registry.add_source(seed, name));
    }
    Ok(sources)
}

/// Runs a driver with the scheduler detected from the environment.
pub fn run(request: &RunRequest, settings: &Settings) -> Result<RunSummary, WorkflowError> {
    let mut submitter = Submitter::from_settings(settings);
    run_with(request, &mut submitter)
}

/// Runs a driver through `submitter`.
pub fn run_with<R: CommandRunner>(
    request: &RunRequest,
    submitter: &mut Submitter<R>,
) -> Result<RunSummary, WorkflowError> {
    info!("Workflow: {}", request.pipeline);

    let sheet = SampleSheet::from_path(&request.sample_sheet, request.layout)?;
    let assets = Assets::load(&request.assets)?;

    let plan = request.plan();
    plan.log_summary();

    let mut registry = Registry::new();
    let sources = add_sources(&mut registry, request, &sheet, &assets)?;
    request.pipeline.build(&mut registry, &sources, &plan)?;
    info!("Task graph: {} tasks from {} annotations", registry.len(), sources.len());

    let submitted = registry.submit_all(submitter)?;

    let verifier = TerminalVerifier::new(&registry, &[])?;
    let verify_mode = plan.mode_for(VERIFY_KIND);
    let handle = verifier.submit(&request.working_dir, verify_mode, submitter)?;

    let record = SubmissionRecord::from_registry(&registry)
        .save(&request.working_dir)
        .map_err(WorkflowError::Record)?;

    let verified = if verify_mode == ExecutionMode::Run && !submitter.in_scheduler() {
        local_outcome(&request.working_dir)
    } else {
        None
    };

    Ok(RunSummary {
        tasks: registry.len(),
        submitted,
        verifier: handle,
        record,
        verified,
    })
}

/// Reads the marker a local verification pass left behind.
fn local_outcome(working_dir: &Path) -> Option<bool> {
    if working_dir.join(SUCCESS_MARKER).exists() {
        Some(true)
    } else if working_dir.join(FAILURE_MARKER).exists() {
        Some(false)
    } else {
        None
    }
}
