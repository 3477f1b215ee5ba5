//! Stage Kinds
//!
//! Concrete task kinds of the RNA-Seq pipelines, and [`run_stage`], the
//! entry point of `rnaseqde stage <kind>` that the submitter launches.
//!
//! - [`align_star`], [`align_hisat2`]: Read alignment
//! - [`conv_sam2bam`]: SAM to sorted BAM
//! - [`quant_rsem`], [`quant_stringtie`]: Abundance estimation
//! - [`conv_rsem2mat`]: Per-sample tables to count matrices
//! - [`de_ebseq`], [`de_ballgown`]: Differential expression

pub mod align_hisat2;
pub mod align_star;
pub mod conv_rsem2mat;
pub mod conv_sam2bam;
pub mod de_ballgown;
pub mod de_ebseq;
pub mod quant_rsem;
pub mod quant_stringtie;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::StageError;
use crate::graph::{ShardRequest, Stage, ToolCommand, ValueMap};
use crate::shard::{scatter, ShardIndex};
use crate::submit::{wire, CommandLine, CommandRunner};

pub use align_hisat2::AlignHisat2;
pub use align_star::AlignStar;
pub use conv_rsem2mat::ConvRsemToMatrix;
pub use conv_sam2bam::ConvSamToBam;
pub use de_ballgown::DeBallgown;
pub use de_ebseq::DeEbseq;
pub use quant_rsem::QuantRsem;
pub use quant_stringtie::QuantStringtie;

/// Every stage kind, by name.
pub const CATALOG: &[&dyn Stage] = &[
    &AlignStar,
    &AlignHisat2,
    &ConvSamToBam,
    &QuantRsem,
    &QuantStringtie,
    &ConvRsemToMatrix,
    &DeEbseq,
    &DeBallgown,
];

/// Extension stripped from read files when a sample name is derived from them.
const READ_EXTENSION: &str = ".fastq.gz";

/// Looks up a stage kind by name.
pub fn find(name: &str) -> Option<&'static dyn Stage> {
    CATALOG.iter().copied().find(|stage| stage.name() == name)
}

/// Result of one stage invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageOutcome {
    pub executed: usize,
    pub failed: usize,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs one stage executable invocation: parses its wire arguments,
/// selects this process's shard and runs the resulting tool commands.
///
/// `--output-dir` is required; a bare `--dry-run` logs the commands
/// without running them.
pub fn run_stage<R: CommandRunner>(
    name: &str,
    args: &[String],
    settings: &Settings,
    runner: &mut R,
) -> Result<StageOutcome, StageError> {
    let stage = find(name).ok_or_else(|| StageError::UnknownStage(name.to_string()))?;

    let mut parsed = wire::from_args(args)?;
    let output_dir = parsed
        .remove("output-dir")
        .and_then(|v| v.as_str().map(PathBuf::from))
        .ok_or_else(|| StageError::MissingArgument("output-dir".to_string()))?;
    let dry_run = parsed.remove("dry-run").is_some_and(|v| v.is_set());

    let shard = ShardIndex::from_env(&settings.scheduler.shard_var)?;
    let options = settings.tool_options(name)?;
    let script_dir = settings.script_dir();

    let request = ShardRequest {
        args: &parsed,
        output_dir,
        shard,
        options: &options,
        script_dir: &script_dir,
    };
    let commands = stage.commands(&request)?;

    info!(
        "{}: {} command(s){}",
        name,
        commands.len(),
        shard.map(|s| format!(" for shard {}", s)).unwrap_or_default()
    );

    let mut outcome = StageOutcome::default();
    for command in &commands {
        info!("Command: {}", command.display());
        if dry_run {
            continue;
        }
        if !run_tool(command, runner)? {
            outcome.failed += 1;
        }
        outcome.executed += 1;
    }

    Ok(outcome)
}

/// Runs one tool command, capturing its output into the log directory.
/// Returns whether the tool exited successfully.
fn run_tool<R: CommandRunner>(command: &ToolCommand, runner: &mut R) -> Result<bool, StageError> {
    fs::create_dir_all(&command.log_dir)?;

    let line = CommandLine::new(&command.program).args(command.args.iter().cloned());
    let output = runner.run(&line).map_err(|source| StageError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    let stdout_path = match &command.stdout_to {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            path.clone()
        }
        None => command.log_dir.join("stdout.log"),
    };
    fs::write(&stdout_path, &output.stdout)?;
    fs::write(command.log_dir.join("stderr.log"), &output.stderr)?;
    debug!("Captured output of {} in {}", command.program, command.log_dir.display());

    if !output.success() {
        warn!(
            "{} exited with {:?}; see {}",
            command.program,
            output.code,
            command.log_dir.join("stderr.log").display()
        );
    }
    Ok(output.success())
}

/// One sample's reads, as handled by an aligner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReadUnit<'a> {
    pub sample: String,
    pub read1: &'a str,
    pub read2: Option<&'a str>,
}

/// Sample name derived from a read file when the sheet gives none.
fn sample_from_read(read: &str) -> String {
    let name = Path::new(read)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| read.to_string());
    name.strip_suffix(READ_EXTENSION).map(str::to_string).unwrap_or(name)
}

/// Unit names for the declared outputs of an aligner: the `sample` input,
/// or names derived from the first read of every unit.
pub(crate) fn aligner_units(inputs: &ValueMap) -> Vec<String> {
    let samples = inputs.get_items("sample");
    if !samples.is_empty() {
        return samples.into_iter().map(str::to_string).collect();
    }

    let reads = inputs.get_items("fastq");
    let step = if inputs.get_str("layout") == Some(crate::graph::PAIRED_END) { 2 } else { 1 };
    reads.iter().step_by(step).map(|r| sample_from_read(r)).collect()
}

/// Splits the `fastq` argument into read units and keeps this shard's.
pub(crate) fn read_units<'a>(request: &ShardRequest<'a>) -> Result<Vec<ReadUnit<'a>>, StageError> {
    let reads = request.items("fastq");
    if reads.is_empty() {
        return Err(StageError::MissingArgument("fastq".to_string()));
    }

    let (read1, read2): (Vec<&str>, Vec<Option<&str>>) = if request.is_paired() {
        if reads.len() % 2 != 0 {
            return Err(StageError::Misaligned {
                key: "fastq".to_string(),
                expected: reads.len() + 1,
                found: reads.len(),
            });
        }
        reads.chunks(2).map(|pair| (pair[0], Some(pair[1]))).unzip()
    } else {
        reads.iter().map(|r| (*r, None)).unzip()
    };

    let read1 = scatter(&read1, request.shard)?;
    let read2 = scatter(&read2, request.shard)?;

    let samples: Vec<String> = match request.items("sample") {
        given if given.is_empty() => read1.iter().map(|r| sample_from_read(r)).collect(),
        given => scatter(&given, request.shard)?
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    if samples.len() != read1.len() {
        return Err(StageError::Misaligned {
            key: "sample".to_string(),
            expected: read1.len(),
            found: samples.len(),
        });
    }

    Ok(samples
        .into_iter()
        .zip(read1.into_iter().zip(read2))
        .map(|(sample, (read1, read2))| ReadUnit {
            sample,
            read1,
            read2,
        })
        .collect())
}
