//! Job Handles
//!
//! A submitted task holds exactly one handle. The engine never learns
//! whether the job finished; completion is only known from the output check
//! that runs after everything else.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token identifying a submitted task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum JobHandle {
    /// Accepted by the scheduler under this job id
    Scheduled(String),
    /// Fabricated locally (dry-run or local execution); never a hold target
    Placeholder(String),
}

impl JobHandle {
    pub fn id(&self) -> &str {
        match self {
            JobHandle::Scheduled(id) | JobHandle::Placeholder(id) => id,
        }
    }

    /// Returns the scheduler job id, if the scheduler assigned one.
    pub fn scheduled_id(&self) -> Option<&str> {
        match self {
            JobHandle::Scheduled(id) => Some(id),
            JobHandle::Placeholder(_) => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_id().is_some()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Extracts the job id from terse scheduler output.
///
/// Array submissions answer `<id>.<first>-<last>:<step>`; the suffix is
/// stripped so that holds refer to the whole array.
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let id = line.split('.').next().unwrap_or(line).trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_job_id() {
        assert_eq!(parse_job_id("4242\n"), Some("4242".to_string()));
    }

    #[test]
    fn test_parse_array_job_id_strips_suffix() {
        assert_eq!(parse_job_id("4243.1-2:1\n"), Some("4243".to_string()));
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        assert_eq!(parse_job_id("\n  \n 77 \n"), Some("77".to_string()));
    }

    #[test]
    fn test_parse_empty_output() {
        assert_eq!(parse_job_id(""), None);
        assert_eq!(parse_job_id("  \n"), None);
        assert_eq!(parse_job_id(".1-2:1"), None);
    }

    #[test]
    fn test_placeholder_is_not_scheduled() {
        let handle = JobHandle::Placeholder("dry-1".to_string());
        assert!(!handle.is_scheduled());
        assert_eq!(handle.scheduled_id(), None);
        assert_eq!(handle.to_string(), "dry-1");
    }

    #[test]
    fn test_handle_serialization() {
        let handle = JobHandle::Scheduled("4242".to_string());
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"state":"scheduled","id":"4242"}"#);

        let back: JobHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }
}
