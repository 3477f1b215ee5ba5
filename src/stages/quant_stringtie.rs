//! StringTie quantification against the reference annotation.

use crate::config::Strandness;
use crate::error::{GraphError, StageError};
use crate::graph::stage::{per_unit_outputs, unit_of};
use crate::graph::{ArraySpec, Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

const BINDINGS: &[Binding] = &[
    Binding::required("gtf", "gtf"),
    Binding::required("bam", "bam"),
    Binding::optional("strandness", "strandness"),
];

const GTF: &str = "quantified.gtf";

#[derive(Debug, Clone, Copy)]
pub struct QuantStringtie;

impl Stage for QuantStringtie {
    fn name(&self) -> &'static str {
        "quant_stringtie"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn array(&self) -> Option<ArraySpec> {
        Some(ArraySpec::over("bam"))
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        let units: Vec<String> = ctx.inputs.get_items("bam").into_iter().map(unit_of).collect();
        let units: Vec<&str> = units.iter().map(String::as_str).collect();
        Ok(per_unit_outputs(
            ctx.output_dir,
            &units,
            &[("quantified-gtf", GTF), ("ctab", "t_data.ctab")],
        ))
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let gtf = request.require("gtf")?;
        let strandness: Strandness = request.optional("strandness").unwrap_or("none").parse()?;

        Ok(request
            .scattered("bam")?
            .into_iter()
            .map(|bam| {
                let unit_dir = request.unit_dir(&unit_of(bam));
                let output = unit_dir.join(GTF).to_string_lossy().into_owned();

                // -e -B: estimate reference transcripts only, write ballgown tables
                let mut command = ToolCommand::new("stringtie", unit_dir)
                    .options(request.options)
                    .option("-G", gtf)
                    .arg("-e")
                    .arg("-B");
                command = match strandness {
                    Strandness::Fr => command.arg("--fr"),
                    Strandness::Rf => command.arg("--rf"),
                    Strandness::None => command,
                };
                command.option("-o", output).arg(bam)
            })
            .collect())
    }
}
