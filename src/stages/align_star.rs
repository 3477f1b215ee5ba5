//! STAR alignment, one shard per sample.

use crate::error::{GraphError, StageError};
use crate::graph::stage::per_unit_outputs;
use crate::graph::{ArraySpec, Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

use super::{aligner_units, read_units};

const BINDINGS: &[Binding] = &[
    Binding::required("index", "star-index"),
    Binding::required("gtf", "gtf"),
    Binding::required("fastq", "fastq"),
    Binding::optional("sample", "sample"),
    Binding::optional("layout", "layout"),
];

const OUTPUTS: &[(&str, &str)] = &[
    ("bam", "Aligned.sortedByCoord.out.bam"),
    ("transcript-bam", "Aligned.toTranscriptome.out.bam"),
    ("sjdb", "SJ.out.tab"),
];

#[derive(Debug, Clone, Copy)]
pub struct AlignStar;

impl Stage for AlignStar {
    fn name(&self) -> &'static str {
        "align_star"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn array(&self) -> Option<ArraySpec> {
        Some(ArraySpec::over("fastq").aligned_with(&["sample"]).with_paired_reads())
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        let units = aligner_units(ctx.inputs);
        let units: Vec<&str> = units.iter().map(String::as_str).collect();
        Ok(per_unit_outputs(ctx.output_dir, &units, OUTPUTS))
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let index = request.require("index")?;
        let gtf = request.require("gtf")?;

        read_units(request)?
            .into_iter()
            .map(|unit| {
                let unit_dir = request.unit_dir(&unit.sample);
                // STAR takes a prefix, not a directory
                let prefix = format!("{}/", unit_dir.display());

                let mut command = ToolCommand::new("STAR", &unit_dir)
                    .options(request.options)
                    .option("--genomeDir", index)
                    .option("--sjdbGTFfile", gtf)
                    .arg("--readFilesIn")
                    .arg(unit.read1);
                if let Some(read2) = unit.read2 {
                    command = command.arg(read2);
                }
                Ok(command.option("--outFileNamePrefix", prefix))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Registry, Value};
    use crate::stages::testing::request;
    use std::path::Path;

    fn reference() -> ValueMap {
        ValueMap::new()
            .with("star-index", "/ref/star")
            .with("gtf", "/ref/a.gtf")
    }

    #[test]
    fn test_declared_outputs_per_sample() {
        let mut registry = Registry::new();
        let seed = reference()
            .with("fastq", Value::list(["s1.fastq.gz", "s2.fastq.gz"]))
            .with("sample", Value::list(["s1", "s2"]))
            .with("group", Value::list(["a", "b"]));
        let source = registry.add_source(seed, "gencode");
        let task = registry.add_task(&AlignStar, &[source]).unwrap();

        let declared = registry.declared_outputs(task).unwrap();
        assert_eq!(
            declared.get_items("transcript-bam"),
            vec![
                "gencode/align_star/s1/Aligned.toTranscriptome.out.bam",
                "gencode/align_star/s2/Aligned.toTranscriptome.out.bam"
            ]
        );
        assert_eq!(declared.len(), 3);

        // Upstream values pass through to downstream tasks.
        let outputs = registry.outputs(task).unwrap();
        assert_eq!(outputs.get_items("group"), vec!["a", "b"]);
        assert_eq!(registry.shard_count(task).unwrap(), Some(2));
    }

    #[test]
    fn test_paired_end_shard_count_is_halved() {
        let mut registry = Registry::new();
        let seed = reference()
            .with("fastq", Value::list(["a_1.fq", "a_2.fq", "b_1.fq", "b_2.fq"]))
            .with("sample", Value::list(["a", "b"]))
            .with("layout", "pe");
        let source = registry.add_source(seed, "gencode");
        let task = registry.add_task(&AlignStar, &[source]).unwrap();

        assert_eq!(registry.shard_count(task).unwrap(), Some(2));
    }

    #[test]
    fn test_missing_index_fails_construction() {
        let mut registry = Registry::new();
        let seed = ValueMap::new()
            .with("gtf", "/ref/a.gtf")
            .with("fastq", Value::list(["a.fq"]));
        let source = registry.add_source(seed, "gencode");

        assert!(matches!(
            registry.add_task(&AlignStar, &[source]),
            Err(GraphError::MissingKey { key, .. }) if key == "star-index"
        ));
    }

    #[test]
    fn test_shard_command() {
        let args = ValueMap::new()
            .with("index", "/ref/star")
            .with("gtf", "/ref/a.gtf")
            .with("fastq", Value::list(["a_1.fq", "a_2.fq", "b_1.fq", "b_2.fq"]))
            .with("sample", Value::list(["a", "b"]))
            .with("layout", "pe");
        let options = ValueMap::new().with("--runThreadN", "4");

        let commands = AlignStar
            .commands(&request(&args, "gencode/align_star", Some(1), &options))
            .unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].log_dir, Path::new("gencode/align_star/a"));
        assert_eq!(
            commands[0].display(),
            "STAR --runThreadN 4 --genomeDir /ref/star --sjdbGTFfile /ref/a.gtf \
             --readFilesIn a_1.fq a_2.fq --outFileNamePrefix gencode/align_star/a/"
        );
    }
}
