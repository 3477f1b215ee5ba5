//! Submission Record
//!
//! After a driver run, the kind, output directory, mode and job handle of
//! every task are saved to `.rnaseqde/submissions.json` so that operators
//! can map scheduler job ids back to pipeline stages.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::graph::Registry;

use super::job::JobHandle;

/// Directory holding the record, relative to the working directory.
pub const RECORD_DIR: &str = ".rnaseqde";

const RECORD_FILE: &str = "submissions.json";

/// One task of a submitted pipeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    pub kind: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    /// `None` for Source Nodes
    pub job: Option<JobHandle>,
}

/// Persisted view of one driver run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubmissionRecord {
    pub created_at: DateTime<Utc>,
    pub entries: Vec<RecordEntry>,
}

impl SubmissionRecord {
    /// Snapshots every task of `registry`, in construction order.
    pub fn from_registry(registry: &Registry) -> Self {
        let entries = registry
            .tasks()
            .map(|task| RecordEntry {
                kind: task.kind().to_string(),
                output_dir: task.output_dir().to_path_buf(),
                dry_run: task.mode().is_dry_run(),
                job: task.job().cloned(),
            })
            .collect();

        Self {
            created_at: Utc::now(),
            entries,
        }
    }

    /// Scheduler job ids in the record.
    pub fn scheduled_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.job.as_ref().and_then(JobHandle::scheduled_id))
            .collect()
    }

    /// Writes the record below `working_dir` and returns the file path.
    pub fn save(&self, working_dir: &Path) -> io::Result<PathBuf> {
        let dir = working_dir.join(RECORD_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, json)?;

        info!("Saved submission record to {}", path.display());
        Ok(path)
    }

    /// Loads the record saved below `working_dir`.
    pub fn load(working_dir: &Path) -> io::Result<Self> {
        let path = working_dir.join(RECORD_DIR).join(RECORD_FILE);
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Registry, ValueMap};
    use tempfile::tempdir;

    #[test]
    fn test_record_save_creates_dir() {
        let dir = tempdir().unwrap();
        let mut registry = Registry::new();
        registry.add_source(ValueMap::new().with("gtf", "a.gtf"), "gencode");

        let record = SubmissionRecord::from_registry(&registry);
        let path = record.save(dir.path()).unwrap();

        assert!(path.exists());
        assert!(dir.path().join(RECORD_DIR).is_dir());
    }

    #[test]
    fn test_record_roundtrip() {
        let dir = tempdir().unwrap();
        let record = SubmissionRecord {
            created_at: Utc::now(),
            entries: vec![
                RecordEntry {
                    kind: "source".to_string(),
                    output_dir: PathBuf::from("gencode"),
                    dry_run: false,
                    job: None,
                },
                RecordEntry {
                    kind: "align_star".to_string(),
                    output_dir: PathBuf::from("gencode/align_star"),
                    dry_run: false,
                    job: Some(JobHandle::Scheduled("4242".to_string())),
                },
                RecordEntry {
                    kind: "quant_rsem".to_string(),
                    output_dir: PathBuf::from("gencode/align_star/quant_rsem"),
                    dry_run: true,
                    job: Some(JobHandle::Placeholder("dry-1".to_string())),
                },
            ],
        };

        record.save(dir.path()).unwrap();
        let loaded = SubmissionRecord::load(dir.path()).unwrap();

        assert_eq!(loaded.entries, record.entries);
        assert_eq!(loaded.scheduled_ids(), vec!["4242"]);
    }

    #[test]
    fn test_record_load_nonexistent() {
        let dir = tempdir().unwrap();
        assert!(SubmissionRecord::load(dir.path()).is_err());
    }
}
