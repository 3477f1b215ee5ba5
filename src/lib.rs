//! rnaseqde - RNA-Seq Differential Expression Pipeline Coordinator
//!
//! Builds RNA-Seq pipelines as a graph of tasks and hands each task to a
//! Grid Engine style batch scheduler, wiring scheduler-side dependencies
//! so that the whole pipeline can be queued at once. The last job checks
//! that every declared output exists.
//!
//! # Architecture
//!
//! - [`graph`]: Task values, the task registry and stage kinds' contract
//! - [`submit`]: Scheduler submission, wire format and local execution
//! - [`shard`]: Shard selection inside array jobs
//! - [`verify`]: Output manifest and the Terminal Verifier
//! - [`stages`]: Concrete stage kinds and their executable side
//! - [`workflow`]: Pipeline drivers
//! - [`config`]: Settings, assets, tool options and the sample sheet
//!
//! # Example
//!
//! ```rust,no_run
//! use rnaseqde::config::Settings;
//! use rnaseqde::workflow::{run, Pipeline, RunRequest};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load_default()?;
//!
//!     let mut request = RunRequest::new("samples.tsv", std::env::current_dir()?);
//!     request.pipeline = Pipeline::Hisat2Stringtie;
//!     request.dry_run = true;
//!
//!     let summary = run(&request, &settings)?;
//!     println!("{} tasks, verifier {}", summary.tasks, summary.verifier);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod paths;
pub mod shard;
pub mod stages;
pub mod submit;
pub mod verify;
pub mod workflow;

// Re-export commonly used types
pub use graph::{Registry, Stage, TaskId, Value, ValueMap};
pub use submit::{JobHandle, Submitter};
pub use verify::TerminalVerifier;
pub use workflow::{Pipeline, RunRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name; also the stage executable looked up on `PATH` when
/// the running binary cannot be resolved.
pub const APP_NAME: &str = "rnaseqde";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "rnaseqde");
    }

    #[test]
    fn test_every_pipeline_stage_is_in_the_catalog() {
        for pipeline in Pipeline::ALL {
            for (_, kinds) in pipeline.steps() {
                for kind in kinds.iter() {
                    assert!(stages::find(kind).is_some(), "{} is not a known stage", kind);
                }
            }
        }
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
