//! Output Manifest
//!
//! Tab-delimited `job<TAB>path` rows, one per declared output path. The
//! manifest is written at submission time and read back by the
//! verification pass, which may run on another host.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::VerifyError;

/// Default manifest file name inside the working directory.
pub const MANIFEST_FILE: &str = "outputs.tsv";

/// Job column of outputs whose task has no job handle.
pub const NO_JOB: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub job: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    rows: Vec<ManifestRow>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row unless the same `(job, path)` pair is already present.
    pub fn push(&mut self, job: impl Into<String>, path: impl Into<String>) {
        let row = ManifestRow {
            job: job.into(),
            path: path.into(),
        };
        if !self.rows.contains(&row) {
            self.rows.push(row);
        }
    }

    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_tsv(&self) -> String {
        self.rows
            .iter()
            .map(|row| format!("{}\t{}\n", row.job, row.path))
            .collect()
    }

    pub fn parse(content: &str) -> Result<Self, VerifyError> {
        let mut manifest = Self::new();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (job, path) = line
                .split_once('\t')
                .filter(|(job, path)| !job.is_empty() && !path.is_empty())
                .ok_or_else(|| VerifyError::MalformedRow {
                    line: index + 1,
                    content: line.to_string(),
                })?;
            manifest.push(job, path);
        }

        Ok(manifest)
    }

    pub fn write(&self, path: &Path) -> Result<(), VerifyError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| VerifyError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_tsv()).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Wrote {} manifest rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, VerifyError> {
        let content = fs::read_to_string(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}
