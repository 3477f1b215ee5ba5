//! Error Types
//!
//! One enum per failure class of the engine. Graph-construction and
//! submission errors abort the driver; verification problems are not errors
//! at all but entries in the verification outcome.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or querying the task graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("task '{task}' requires upstream key '{key}' but no upstream task provides it")]
    MissingKey { task: String, key: String },

    #[error("task '{task}': '{key}' has {found} entries but {expected} shards were expected")]
    ShardMismatch {
        task: String,
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("task '{task}': paired-end list '{key}' has an odd number of entries ({found})")]
    UnpairedReads {
        task: String,
        key: String,
        found: usize,
    },

    #[error("task '{task}' has no shards to submit ('{key}' is empty)")]
    EmptyShards { task: String, key: String },

    #[error("task '{task}': value '{key}' must be a list or a single path")]
    NotAList { task: String, key: String },

    #[error("unknown task id #{0}")]
    UnknownTask(usize),
}

/// Errors raised while handing a task to the scheduler or running it locally.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("task '{0}' was already submitted")]
    AlreadySubmitted(String),

    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("scheduler rejected '{task}' (exit code {code:?}): {stderr}")]
    Rejected {
        task: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("scheduler returned no job id for '{0}'")]
    EmptyJobId(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors in the shard index protocol.
#[derive(Error, Debug, PartialEq)]
pub enum ShardError {
    #[error("shard index '{0}' is not a positive integer")]
    Invalid(String),

    #[error("shard index {index} is out of range for {len} entries")]
    OutOfRange { index: usize, len: usize },
}

/// Errors while reading or writing the output manifest.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest line {line} is malformed: '{content}'")]
    MalformedRow { line: usize, content: String },
}

/// Errors while loading settings, assets or the sample sheet.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("sample sheet is missing required column '{0}'")]
    MissingColumn(String),

    #[error("sample sheet line {line} has {found} fields, header has {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("sample names are not unique: '{0}' appears more than once")]
    DuplicateSample(String),

    #[error("read file does not exist: {0}")]
    MissingReadFile(String),

    #[error("sample sheet has no samples")]
    EmptySampleSheet,

    #[error("reference '{0}' is not defined in the assets file")]
    UnknownReference(String),

    #[error("annotation '{annotation}' is not defined for reference '{reference}'")]
    UnknownAnnotation {
        reference: String,
        annotation: String,
    },

    #[error("unknown step '{0}' (expected align, quant or de)")]
    UnknownStep(String),

    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    #[error("invalid value '{value}' for {option}")]
    InvalidOption { option: String, value: String },
}

/// Errors that abort a workflow driver run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("no annotations selected for reference '{0}'")]
    NoAnnotations(String),

    #[error("failed to save submission record: {0}")]
    Record(#[source] io::Error),
}

/// Errors raised by a stage executable while running its shard.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("unknown stage kind '{0}'")]
    UnknownStage(String),

    #[error("malformed argument '{0}': expected --key")]
    MalformedArgument(String),

    #[error("missing required argument --{0}")]
    MissingArgument(String),

    #[error("--{key}: {found} entries do not line up with {expected} samples")]
    Misaligned {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
