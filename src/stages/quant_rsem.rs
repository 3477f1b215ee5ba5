//! RSEM quantification from transcriptome-mapped BAM files.
//!
//! Results of each sample land in a directory named after the directory
//! of its input BAM, i.e. the sample name given at alignment.

use crate::config::{Layout, Strandness};
use crate::error::{GraphError, StageError};
use crate::graph::stage::{per_unit_outputs, unit_of};
use crate::graph::{ArraySpec, Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

const BINDINGS: &[Binding] = &[
    Binding::required("index", "rsem-index"),
    Binding::required("transcript-bam", "transcript-bam"),
    Binding::optional("layout", "layout"),
    Binding::optional("strandness", "strandness"),
];

const PREFIX: &str = "quantified";

const OUTPUTS: &[(&str, &str)] = &[
    ("gene-tsv", "quantified.genes.results"),
    ("transcript-tsv", "quantified.isoforms.results"),
    ("stat", "quantified.stat"),
];

#[derive(Debug, Clone, Copy)]
pub struct QuantRsem;

/// Probability of a read coming from the forward strand.
fn forward_prob(strandness: Strandness) -> &'static str {
    match strandness {
        Strandness::Fr => "1.0",
        Strandness::Rf => "0.0",
        Strandness::None => "0.5",
    }
}

impl Stage for QuantRsem {
    fn name(&self) -> &'static str {
        "quant_rsem"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn array(&self) -> Option<ArraySpec> {
        Some(ArraySpec::over("transcript-bam"))
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        let units: Vec<String> = ctx.inputs.get_items("transcript-bam").into_iter().map(unit_of).collect();
        let units: Vec<&str> = units.iter().map(String::as_str).collect();
        Ok(per_unit_outputs(ctx.output_dir, &units, OUTPUTS))
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let index = request.require("index")?;
        let layout: Layout = request.optional("layout").unwrap_or("sr").parse()?;
        let strandness: Strandness = request.optional("strandness").unwrap_or("none").parse()?;

        Ok(request
            .scattered("transcript-bam")?
            .into_iter()
            .map(|bam| {
                let unit_dir = request.unit_dir(&unit_of(bam));
                let prefix = unit_dir.join(PREFIX).to_string_lossy().into_owned();

                let mut command = ToolCommand::new("rsem-calculate-expression", unit_dir).options(request.options);
                if layout == Layout::Paired {
                    command = command.arg("--paired-end");
                }
                command
                    .option("--forward-prob", forward_prob(strandness))
                    .arg("--alignments")
                    .arg(bam)
                    .arg(index)
                    .arg(prefix)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Registry, Value};
    use crate::stages::testing::request;
    use crate::stages::AlignStar;

    #[test]
    fn test_outputs_follow_sample_directories() {
        let mut registry = Registry::new();
        let seed = ValueMap::new()
            .with("star-index", "/ref/star")
            .with("rsem-index", "/ref/rsem/index")
            .with("gtf", "/ref/a.gtf")
            .with("fastq", Value::list(["s1.fq", "s2.fq"]))
            .with("sample", Value::list(["s1", "s2"]));
        let source = registry.add_source(seed, "gencode");
        let align = registry.add_task(&AlignStar, &[source]).unwrap();
        let quant = registry.add_task(&QuantRsem, &[align]).unwrap();

        let declared = registry.declared_outputs(quant).unwrap();
        assert_eq!(
            declared.get_items("gene-tsv"),
            vec![
                "gencode/align_star/quant_rsem/s1/quantified.genes.results",
                "gencode/align_star/quant_rsem/s2/quantified.genes.results"
            ]
        );
        assert_eq!(registry.shard_count(quant).unwrap(), Some(2));
    }

    #[test]
    fn test_paired_stranded_command() {
        let args = ValueMap::new()
            .with("index", "/ref/rsem/index")
            .with("transcript-bam", Value::list(["a/s1/Aligned.toTranscriptome.out.bam"]))
            .with("layout", "pe")
            .with("strandness", "fr");
        let options = ValueMap::new();

        let commands = QuantRsem
            .commands(&request(&args, "a/quant_rsem", Some(1), &options))
            .unwrap();

        assert_eq!(
            commands[0].display(),
            "rsem-calculate-expression --paired-end --forward-prob 1.0 --alignments \
             a/s1/Aligned.toTranscriptome.out.bam /ref/rsem/index a/quant_rsem/s1/quantified"
        );
    }

    #[test]
    fn test_unstranded_single_end_defaults() {
        let args = ValueMap::new()
            .with("index", "/ref/rsem/index")
            .with("transcript-bam", "a/s1/Aligned.toTranscriptome.out.bam");
        let options = ValueMap::new();

        let commands = QuantRsem.commands(&request(&args, "q", None, &options)).unwrap();
        assert!(!commands[0].args.contains(&"--paired-end".to_string()));
        assert!(commands[0].args.windows(2).any(|w| w == ["--forward-prob", "0.5"]));
    }
}
