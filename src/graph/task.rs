//! Task Nodes
//!
//! A task is either a Source Node (a fixed value map with no upstream) or a
//! stage node whose behaviour comes from its [`Stage`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SubmitError;
use crate::submit::JobHandle;

use super::mode::ExecutionMode;
use super::stage::Stage;
use super::value::ValueMap;

/// Kind name reported for Source Nodes.
pub const SOURCE_KIND: &str = "source";

/// Position of a task in its registry, in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a task is.
#[derive(Debug, Clone)]
pub enum Node {
    /// Entry point exposing a fixed map as its outputs
    Source(ValueMap),
    /// One external-tool step
    Stage(&'static dyn Stage),
}

/// A registered task.
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) node: Node,
    pub(crate) required: Vec<TaskId>,
    pub(crate) output_dir: PathBuf,
    pub(crate) mode: ExecutionMode,
    pub(crate) job: Option<JobHandle>,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Kind name: the stage name, or `source`.
    pub fn kind(&self) -> &'static str {
        match self.node {
            Node::Source(_) => SOURCE_KIND,
            Node::Stage(stage) => stage.name(),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn stage(&self) -> Option<&'static dyn Stage> {
        match self.node {
            Node::Stage(stage) => Some(stage),
            Node::Source(_) => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.node, Node::Source(_))
    }

    /// Upstream tasks, in the order given at construction.
    pub fn required(&self) -> &[TaskId] {
        &self.required
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    /// Stores the job handle. A task is submitted at most once.
    pub(crate) fn assign_job(&mut self, handle: JobHandle) -> Result<(), SubmitError> {
        if self.job.is_some() {
            return Err(SubmitError::AlreadySubmitted(format!("{} {}", self.kind(), self.id)));
        }
        self.job = Some(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Task {
        Task {
            id: TaskId(0),
            node: Node::Source(ValueMap::new().with("gtf", "a.gtf")),
            required: Vec::new(),
            output_dir: PathBuf::from("gencode"),
            mode: ExecutionMode::Run,
            job: None,
        }
    }

    #[test]
    fn test_source_kind() {
        let task = source();
        assert!(task.is_source());
        assert_eq!(task.kind(), SOURCE_KIND);
        assert!(task.stage().is_none());
        assert!(task.required().is_empty());
    }

    #[test]
    fn test_job_assigned_at_most_once() {
        let mut task = source();
        task.assign_job(JobHandle::Placeholder("dry-1".to_string())).unwrap();

        let err = task
            .assign_job(JobHandle::Placeholder("dry-2".to_string()))
            .unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted(_)));
        assert_eq!(task.job().map(JobHandle::id), Some("dry-1"));
    }
}
