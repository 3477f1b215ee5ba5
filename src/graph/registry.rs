//! Task Registry
//!
//! Caller-owned, append-only store of every task built so far. Tasks refer
//! to their upstream by [`TaskId`], and an id can only be obtained for a task
//! that already exists, so the graph is acyclic by construction and
//! construction order is a topological order.
//!
//! All graph queries (inputs, outputs, output directories, shard counts,
//! hold-lists) are computed here on demand from the upstream outputs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{GraphError, SubmitError};
use crate::submit::{wire, CommandRunner, JobHandle, ShardRange, Submission, Submitter};

use super::binding::bind;
use super::mode::ExecutionMode;
use super::stage::{Stage, StageContext};
use super::task::{Node, Task, TaskId};
use super::value::ValueMap;

/// Construction options for a stage task.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    output_dir: Option<PathBuf>,
    mode: ExecutionMode,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the derived output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Every task of one pipeline, in construction order.
#[derive(Debug, Default)]
pub struct Registry {
    tasks: Vec<Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a Source Node exposing `outputs` verbatim.
    pub fn add_source(&mut self, outputs: ValueMap, output_dir: impl Into<PathBuf>) -> TaskId {
        let id = TaskId(self.tasks.len());
        let output_dir = output_dir.into();
        debug!("Registered source {} at {}", id, output_dir.display());
        self.tasks.push(Task {
            id,
            node: Node::Source(outputs),
            required: Vec::new(),
            output_dir,
            mode: ExecutionMode::Run,
            job: None,
        });
        id
    }

    /// Registers a stage task with default options.
    pub fn add_task(&mut self, stage: &'static dyn Stage, required: &[TaskId]) -> Result<TaskId, GraphError> {
        self.add_task_with(stage, required, TaskOptions::default())
    }

    /// Registers a stage task.
    ///
    /// The task's inputs, shard count and declared outputs are resolved
    /// before registration, so wiring defects fail here rather than at
    /// submission time; a task that fails is not registered.
    pub fn add_task_with(
        &mut self,
        stage: &'static dyn Stage,
        required: &[TaskId],
        options: TaskOptions,
    ) -> Result<TaskId, GraphError> {
        for upstream in required {
            self.get(*upstream)?;
        }

        let output_dir = match options.output_dir {
            Some(dir) => dir,
            None => match required.first() {
                Some(upstream) => self.get(*upstream)?.output_dir.join(stage.name()),
                None => PathBuf::from(stage.name()),
            },
        };

        let upstream = self.merge_outputs(required)?;
        let inputs = bind(stage.name(), &upstream, stage.bindings())?;
        if let Some(spec) = stage.array() {
            spec.shard_count(stage.name(), &inputs)?;
        }
        stage.outputs(&StageContext {
            output_dir: &output_dir,
            inputs: &inputs,
        })?;

        let id = TaskId(self.tasks.len());
        debug!("Registered {} {} at {}", stage.name(), id, output_dir.display());
        self.tasks.push(Task {
            id,
            node: Node::Stage(stage),
            required: required.to_vec(),
            output_dir,
            mode: options.mode,
            job: None,
        });
        Ok(id)
    }

    pub fn get(&self, id: TaskId) -> Result<&Task, GraphError> {
        self.tasks.get(id.0).ok_or(GraphError::UnknownTask(id.0))
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task, GraphError> {
        self.tasks.get_mut(id.0).ok_or(GraphError::UnknownTask(id.0))
    }

    /// Every task, in construction order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Ids of every task of one kind, in construction order.
    pub fn tasks_of_kind(&self, kind: &str) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.kind() == kind)
            .map(|t| t.id)
            .collect()
    }

    /// Ids of every Source Node.
    pub fn sources(&self) -> Vec<TaskId> {
        self.tasks.iter().filter(|t| t.is_source()).map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn output_dir(&self, id: TaskId) -> Result<&Path, GraphError> {
        Ok(self.get(id)?.output_dir())
    }

    /// Outputs of `required`, merged in order; later tasks win on collision.
    fn merge_outputs(&self, required: &[TaskId]) -> Result<ValueMap, GraphError> {
        let mut merged = ValueMap::new();
        for upstream in required {
            merged.merge(&self.outputs(*upstream)?);
        }
        Ok(merged)
    }

    /// Merged upstream outputs of a stage task, and its inputs bound from
    /// them.
    fn resolve(&self, task: &Task, stage: &dyn Stage) -> Result<(ValueMap, ValueMap), GraphError> {
        let upstream = self.merge_outputs(&task.required)?;
        let inputs = bind(stage.name(), &upstream, stage.bindings())?;
        Ok((upstream, inputs))
    }

    /// Inputs of a task: merged upstream outputs passed through its binding
    /// schema. Source Nodes have no inputs.
    pub fn inputs(&self, id: TaskId) -> Result<ValueMap, GraphError> {
        let task = self.get(id)?;
        match task.node {
            Node::Source(_) => Ok(ValueMap::new()),
            Node::Stage(stage) => Ok(self.resolve(task, stage)?.1),
        }
    }

    /// Outputs a task declares itself (for a Source Node, its whole map).
    pub fn declared_outputs(&self, id: TaskId) -> Result<ValueMap, GraphError> {
        let task = self.get(id)?;
        match &task.node {
            Node::Source(outputs) => Ok(outputs.clone()),
            Node::Stage(stage) => {
                let (_, inputs) = self.resolve(task, *stage)?;
                stage.outputs(&StageContext {
                    output_dir: &task.output_dir,
                    inputs: &inputs,
                })
            }
        }
    }

    /// Outputs visible downstream: the merged upstream outputs passed
    /// through, overlaid with the task's declared outputs.
    pub fn outputs(&self, id: TaskId) -> Result<ValueMap, GraphError> {
        let task = self.get(id)?;
        match &task.node {
            Node::Source(outputs) => Ok(outputs.clone()),
            Node::Stage(stage) => {
                // Upstream is merged once per level.
                let (mut outputs, inputs) = self.resolve(task, *stage)?;
                outputs.merge(&stage.outputs(&StageContext {
                    output_dir: &task.output_dir,
                    inputs: &inputs,
                })?);
                Ok(outputs)
            }
        }
    }

    /// Number of shards of an array task; `None` for single tasks.
    pub fn shard_count(&self, id: TaskId) -> Result<Option<usize>, GraphError> {
        let task = self.get(id)?;
        let Some(spec) = task.stage().and_then(|s| s.array()) else {
            return Ok(None);
        };
        let inputs = self.inputs(id)?;
        spec.shard_count(task.kind(), &inputs).map(Some)
    }

    /// Scheduler job ids of the upstream tasks: scheduled handles only,
    /// de-duplicated, sorted.
    pub fn hold_ids(&self, id: TaskId) -> Result<Vec<String>, GraphError> {
        let mut holds = BTreeSet::new();
        for upstream in &self.get(id)?.required {
            if let Some(job_id) = self.get(*upstream)?.job().and_then(JobHandle::scheduled_id) {
                holds.insert(job_id.to_string());
            }
        }
        Ok(holds.into_iter().collect())
    }

    /// Builds the submission of a stage task. `None` for Source Nodes.
    pub fn submission(&self, id: TaskId) -> Result<Option<Submission>, GraphError> {
        let task = self.get(id)?;
        let Some(stage) = task.stage() else {
            return Ok(None);
        };

        let mut args = self.inputs(id)?;
        args.insert("output-dir", task.output_dir.to_string_lossy().into_owned());
        if task.mode.is_dry_run() {
            args.insert("dry-run", true);
        }

        let mut command = vec!["stage".to_string(), stage.name().to_string()];
        command.extend(wire::to_args(&args));

        Ok(Some(Submission {
            name: stage.name().to_string(),
            args: command,
            holds: self.hold_ids(id)?,
            shards: self.shard_count(id)?.map(ShardRange::new),
            mode: task.mode,
            log_dir: task.output_dir.clone(),
        }))
    }

    /// Submits one task and stores its job handle. Submitting a Source
    /// Node does nothing and returns `None`.
    pub fn submit<R: CommandRunner>(
        &mut self,
        id: TaskId,
        submitter: &mut Submitter<R>,
    ) -> Result<Option<JobHandle>, SubmitError> {
        let task = self.get(id)?;
        if task.job.is_some() {
            return Err(SubmitError::AlreadySubmitted(format!("{} {}", task.kind(), id)));
        }

        let Some(submission) = self.submission(id)? else {
            return Ok(None);
        };

        let handle = submitter.submit(&submission)?;
        self.get_mut(id)?.assign_job(handle.clone())?;
        Ok(Some(handle))
    }

    /// Submits every not-yet-submitted task in construction order.
    pub fn submit_all<R: CommandRunner>(&mut self, submitter: &mut Submitter<R>) -> Result<usize, SubmitError> {
        let mut submitted = 0;

        for index in 0..self.tasks.len() {
            let id = TaskId(index);
            if self.tasks[index].job.is_some() {
                debug!("{} already submitted", id);
                continue;
            }
            if self.submit(id, submitter)?.is_some() {
                submitted += 1;
            }
        }

        info!("Submitted {} tasks", submitted);
        Ok(submitted)
    }
}
