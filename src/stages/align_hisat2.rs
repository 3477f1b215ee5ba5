//! HISAT2 alignment, one shard per sample.

use crate::config::Strandness;
use crate::error::{GraphError, StageError};
use crate::graph::stage::per_unit_outputs;
use crate::graph::{ArraySpec, Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

use super::{aligner_units, read_units};

const BINDINGS: &[Binding] = &[
    Binding::required("index", "hisat2-index"),
    Binding::required("fastq", "fastq"),
    Binding::optional("sample", "sample"),
    Binding::optional("layout", "layout"),
    Binding::optional("strandness", "strandness"),
];

const SAM: &str = "aligned.sam";

#[derive(Debug, Clone, Copy)]
pub struct AlignHisat2;

impl Stage for AlignHisat2 {
    fn name(&self) -> &'static str {
        "align_hisat2"
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
        Ok(per_unit_outputs(ctx.output_dir, &units, &[("sam", SAM)]))
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let index = request.require("index")?;
        let strandness: Strandness = request.optional("strandness").unwrap_or("none").parse()?;

        read_units(request)?
            .into_iter()
            .map(|unit| {
                let unit_dir = request.unit_dir(&unit.sample);

                let mut command = ToolCommand::new("hisat2", &unit_dir)
                    .options(request.options)
                    .option("-x", index);
                command = match unit.read2 {
                    Some(read2) => command.option("-1", unit.read1).option("-2", read2),
                    None => command.option("-U", unit.read1),
                };
                command = match strandness {
                    Strandness::Fr => command.option("--rna-strandness", "FR"),
                    Strandness::Rf => command.option("--rna-strandness", "RF"),
                    Strandness::None => command,
                };

                Ok(command
                    .option("-S", unit_dir.join(SAM).to_string_lossy())
                    .option("--un-conc", unit_dir.join("unaligned.fastq").to_string_lossy()))
            })
            .collect()
    }
}
