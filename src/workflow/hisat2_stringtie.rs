//! HISAT2 -> StringTie
//!
//! Aligns with HISAT2, sorts the alignments into BAM, quantifies reference
//! transcripts with StringTie and tests them for differential expression
//! with Ballgown.

use crate::error::GraphError;
use crate::graph::{Registry, StagePlan, Step, TaskId};
use crate::stages::{AlignHisat2, ConvSamToBam, DeBallgown, QuantStringtie};

use super::add_stage;

pub const STEPS: &[(Step, &[&str])] = &[
    (Step::Align, &["align_hisat2", "conv_sam2bam"]),
    (Step::Quant, &["quant_stringtie"]),
    (Step::De, &["de_ballgown"]),
];

pub fn build(registry: &mut Registry, sources: &[TaskId], plan: &StagePlan) -> Result<Vec<TaskId>, GraphError> {
    let aligned = sources
        .iter()
        .map(|source| add_stage(registry, &AlignHisat2, &[*source], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let sorted = aligned
        .iter()
        .map(|align| add_stage(registry, &ConvSamToBam, &[*align], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let quantified = sorted
        .iter()
        .map(|bam| add_stage(registry, &QuantStringtie, &[*bam], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let tested = quantified
        .iter()
        .map(|quant| add_stage(registry, &DeBallgown, &[*quant], plan))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(aligned
        .into_iter()
        .chain(sorted)
        .chain(quantified)
        .chain(tested)
        .collect())
}
