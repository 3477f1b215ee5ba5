//! Differential expression with Ballgown.
//!
//! Runs the bundled `de_ballgown.R` script once over every sample's
//! StringTie tables. Groups come from the sample sheet the script reads
//! itself.

use crate::error::{GraphError, StageError};
use crate::graph::{Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

const BINDINGS: &[Binding] = &[
    Binding::required("ctab", "ctab"),
    Binding::required("sample-sheet", "sample-sheet"),
];

/// Result tables: (output key, file name).
const RESULTS: &[(&str, &str)] = &[
    ("ballgown-gene-result-tsv", "result_gene.tsv"),
    ("ballgown-transcript-result-tsv", "result_transcript.tsv"),
];

const SCRIPT: &str = "de_ballgown.R";

/// The tables come from StringTie run with `-e` against the reference, so
/// the script is never handed an annotation of its own.
const NO_GTF: &str = "#";

#[derive(Debug, Clone, Copy)]
pub struct DeBallgown;

impl Stage for DeBallgown {
    fn name(&self) -> &'static str {
        "de_ballgown"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        Ok(RESULTS
            .iter()
            .map(|(key, file)| (*key, ctx.output_dir.join(file).to_string_lossy().into_owned()))
            .collect())
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let sample_sheet = request.require("sample-sheet")?;
        let tables = request.items("ctab");
        if tables.is_empty() {
            return Err(StageError::MissingArgument("ctab".to_string()));
        }
        let script = request.script(SCRIPT);

        Ok(vec![ToolCommand::new("Rscript", &request.output_dir)
            .arg(script.to_string_lossy())
            .option("--output-dir", request.output_dir.to_string_lossy())
            .option("--sample-sheet", sample_sheet)
            .option("--gtf", NO_GTF)
            .args(tables)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Registry, Value};
    use crate::stages::testing::request;
    use crate::stages::QuantStringtie;

    #[test]
    fn test_single_command_over_every_table() {
        let args = ValueMap::new()
            .with("ctab", Value::list(["q/s1/t_data.ctab", "q/s2/t_data.ctab"]))
            .with("sample-sheet", "/data/samples.tsv");
        let options = ValueMap::new();

        let commands = DeBallgown.commands(&request(&args, "de", None, &options)).unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].display(),
            "Rscript /opt/rnaseqde/scripts/de_ballgown.R --output-dir de \
             --sample-sheet /data/samples.tsv --gtf # q/s1/t_data.ctab q/s2/t_data.ctab"
        );
    }

    #[test]
    fn test_missing_sample_sheet_is_reported() {
        let args = ValueMap::new().with("ctab", Value::list(["q/s1/t_data.ctab"]));
        let options = ValueMap::new();

        assert!(matches!(
            DeBallgown.commands(&request(&args, "de", None, &options)),
            Err(StageError::MissingArgument(k)) if k == "sample-sheet"
        ));
    }

    #[test]
    fn test_wired_after_stringtie() {
        let mut registry = Registry::new();
        let seed = ValueMap::new()
            .with("bam", Value::list(["b/s1/sorted.bam", "b/s2/sorted.bam"]))
            .with("gtf", "/ref/genes.gtf")
            .with("sample-sheet", "/data/samples.tsv");
        let source = registry.add_source(seed, "gencode");
        let quant = registry.add_task(&QuantStringtie, &[source]).unwrap();
        let de = registry.add_task(&DeBallgown, &[quant]).unwrap();

        let inputs = registry.inputs(de).unwrap();
        assert_eq!(inputs.get_items("ctab").len(), 2);
        assert_eq!(inputs.get_str("sample-sheet"), Some("/data/samples.tsv"));
        assert!(inputs.get("gtf").is_none());

        let declared = registry.declared_outputs(de).unwrap();
        assert_eq!(
            declared.get_str("ballgown-gene-result-tsv"),
            Some("gencode/quant_stringtie/de_ballgown/result_gene.tsv")
        );
        assert_eq!(declared.len(), 2);
        assert_eq!(registry.shard_count(de).unwrap(), None);
    }
}
