//! Task Graph Module
//!
//! Declarative description of a pipeline as a DAG of tasks.
//!
//! - [`value`]: Values exchanged between tasks
//! - [`binding`]: Input bindings and array shard schemas
//! - [`stage`]: The behaviour of one task kind
//! - [`task`]: Task nodes and ids
//! - [`registry`]: Task construction and graph queries
//! - [`mode`]: Per-stage execution modes

pub mod binding;
pub mod mode;
pub mod registry;
pub mod stage;
pub mod task;
pub mod value;

pub use binding::{ArraySpec, Binding, PAIRED_END};
pub use mode::{ExecutionMode, StagePlan, Step};
pub use registry::{Registry, TaskOptions};
pub use stage::{ShardRequest, Stage, StageContext, ToolCommand};
pub use task::{Node, Task, TaskId, SOURCE_KIND};
pub use value::{Value, ValueMap};
