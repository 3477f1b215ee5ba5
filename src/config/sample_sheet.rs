//! Sample Sheet
//!
//! Tab-delimited table with a header row naming at least `sample`, `group`
//! and `fastq1` (plus `fastq2` for paired-end libraries). One row per
//! sample; rows of the same group should be adjacent, since replicate
//! counts are taken in order of first appearance.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::info;

use crate::error::ConfigError;
use crate::graph::{Value, ValueMap, PAIRED_END};

/// Library layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Single reads
    #[default]
    Single,
    /// Paired-end reads
    Paired,
}

impl FromStr for Layout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sr" => Ok(Layout::Single),
            "pe" => Ok(Layout::Paired),
            other => Err(ConfigError::InvalidOption {
                option: "--layout".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Single => f.write_str("sr"),
            Layout::Paired => f.write_str(PAIRED_END),
        }
    }
}

/// Library strandness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strandness {
    #[default]
    None,
    /// First read on the reverse strand
    Rf,
    /// First read on the forward strand
    Fr,
}

impl FromStr for Strandness {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Strandness::None),
            "rf" => Ok(Strandness::Rf),
            "fr" => Ok(Strandness::Fr),
            other => Err(ConfigError::InvalidOption {
                option: "--strandness".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Strandness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strandness::None => "none",
            Strandness::Rf => "rf",
            Strandness::Fr => "fr",
        };
        f.write_str(name)
    }
}

/// One row of the sample sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    pub sample: String,
    pub group: String,
    pub fastq1: String,
    pub fastq2: Option<String>,
}

/// Validated sample sheet.
#[derive(Debug, Clone)]
pub struct SampleSheet {
    layout: Layout,
    rows: Vec<SampleRow>,
}

impl SampleSheet {
    /// Parses sample sheet content. Read files are not checked here.
    pub fn parse(content: &str, layout: Layout) -> Result<Self, ConfigError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(ConfigError::EmptySampleSheet);
        };
        let header: Vec<&str> = header.split('\t').map(str::trim).collect();

        let column = |name: &str| {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| ConfigError::MissingColumn(name.to_string()))
        };
        let sample_col = column("sample")?;
        let group_col = column("group")?;
        let fastq1_col = column("fastq1")?;
        let fastq2_col = match layout {
            Layout::Paired => Some(column("fastq2")?),
            Layout::Single => None,
        };

        let mut rows = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in lines {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields.len() != header.len() {
                return Err(ConfigError::RaggedRow {
                    line: index + 1,
                    expected: header.len(),
                    found: fields.len(),
                });
            }

            let sample = fields[sample_col].to_string();
            if !seen.insert(sample.clone()) {
                return Err(ConfigError::DuplicateSample(sample));
            }

            rows.push(SampleRow {
                sample,
                group: fields[group_col].to_string(),
                fastq1: fields[fastq1_col].to_string(),
                fastq2: fastq2_col.map(|col| fields[col].to_string()),
            });
        }

        if rows.is_empty() {
            return Err(ConfigError::EmptySampleSheet);
        }

        Ok(Self { layout, rows })
    }

    /// Reads and validates a sample sheet, including that every read file
    /// exists.
    pub fn from_path(path: &Path, layout: Layout) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let sheet = Self::parse(&content, layout)?;
        for read in sheet.read_files() {
            if !Path::new(read).exists() {
                return Err(ConfigError::MissingReadFile(read.to_string()));
            }
        }

        info!(
            "Loaded {} samples in {} groups from {}",
            sheet.rows.len(),
            sheet.groups().len(),
            path.display()
        );
        Ok(sheet)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn samples(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.sample.as_str()).collect()
    }

    /// Distinct groups in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !groups.contains(&row.group.as_str()) {
                groups.push(&row.group);
            }
        }
        groups
    }

    /// Read files in sample order; paired-end reads interleaved R1, R2.
    pub fn read_files(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flat_map(|r| std::iter::once(r.fastq1.as_str()).chain(r.fastq2.as_deref()))
            .collect()
    }

    /// Values exposed by the pipeline's Source Node.
    pub fn to_value_map(&self) -> ValueMap {
        let mut map = ValueMap::new()
            .with("sample", Value::list(self.rows.iter().map(|r| r.sample.as_str())))
            .with("group", Value::list(self.rows.iter().map(|r| r.group.as_str())))
            .with("fastq", Value::list(self.read_files()))
            .with("fastq1", Value::list(self.rows.iter().map(|r| r.fastq1.as_str())));

        if self.layout == Layout::Paired {
            let fastq2 = self.rows.iter().map(|r| r.fastq2.as_deref().unwrap_or_default());
            map.insert("fastq2", Value::list(fastq2));
        }

        map.with("layout", self.layout.to_string())
    }
}
