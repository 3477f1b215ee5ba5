//! Job Submission Module
//!
//! Everything between a resolved task and the external batch scheduler.
//!
//! - [`job`]: Job handles and job-id parsing
//! - [`wire`]: Value map <-> command-line flags
//! - [`scheduler`]: Submission command construction and shard ranges
//! - [`runner`]: Subprocess seam
//! - [`submitter`]: The submission algorithm
//! - [`record`]: Persisted record of what was submitted

pub mod job;
pub mod record;
pub mod runner;
pub mod scheduler;
pub mod submitter;
pub mod wire;

pub use job::JobHandle;
pub use record::SubmissionRecord;
pub use runner::{CommandLine, CommandOutput, CommandRunner, SystemRunner};
pub use scheduler::{SchedulerSettings, ShardRange};
pub use submitter::{Submission, Submitter};
