//! STAR -> RSEM -> EBSeq
//!
//! Aligns with STAR, quantifies transcript alignments with RSEM, merges the
//! per-sample tables into count matrices and tests them with EBSeq.

use crate::error::GraphError;
use crate::graph::{Registry, StagePlan, Step, TaskId};
use crate::stages::{AlignStar, ConvRsemToMatrix, DeEbseq, QuantRsem};

use super::add_stage;

pub const STEPS: &[(Step, &[&str])] = &[
    (Step::Align, &["align_star"]),
    (Step::Quant, &["quant_rsem", "conv_rsem2mat"]),
    (Step::De, &["de_ebseq"]),
];

/// Queues the pipeline below every Source Node, one stage at a time.
pub fn build(registry: &mut Registry, sources: &[TaskId], plan: &StagePlan) -> Result<Vec<TaskId>, GraphError> {
    let aligned = sources
        .iter()
        .map(|source| add_stage(registry, &AlignStar, &[*source], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let quantified = aligned
        .iter()
        .map(|align| add_stage(registry, &QuantRsem, &[*align], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let matrices = quantified
        .iter()
        .map(|quant| add_stage(registry, &ConvRsemToMatrix, &[*quant], plan))
        .collect::<Result<Vec<_>, _>>()?;

    let tested = matrices
        .iter()
        .map(|matrix| add_stage(registry, &DeEbseq, &[*matrix], plan))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(aligned
        .into_iter()
        .chain(quantified)
        .chain(matrices)
        .chain(tested)
        .collect())
}
