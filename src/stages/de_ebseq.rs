//! Differential expression with EBSeq.
//!
//! Runs the bundled `de_ebseq.R` script once per quantification level.
//! The script reads the count matrix columns as consecutive replicate
//! blocks, one block per group, so it receives the replicate count of each
//! group in order of first appearance.

use std::path::Path;

use crate::error::{GraphError, StageError};
use crate::graph::{Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

const BINDINGS: &[Binding] = &[
    Binding::required("group", "group"),
    Binding::required("gene-mat-tsv", "gene-mat-tsv"),
    Binding::optional("transcript-mat-tsv", "transcript-mat-tsv"),
    Binding::optional("ngvector", "ebseq-ngvector"),
];

/// Quantification levels: (input key, output key, directory).
const LEVELS: &[(&str, &str, &str)] = &[
    ("gene-mat-tsv", "gene-tsv", "gene"),
    ("transcript-mat-tsv", "transcript-tsv", "transcript"),
];

const SCRIPT: &str = "de_ebseq.R";

/// Placeholder the script accepts when no NgVector applies (gene level).
const NO_NGVECTOR: &str = "#";

#[derive(Debug, Clone, Copy)]
pub struct DeEbseq;

/// Replicate count of every group, in order of first appearance.
fn replicate_counts(groups: &[&str]) -> Vec<usize> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for group in groups {
        match counts.iter_mut().find(|(name, _)| name == group) {
            Some((_, count)) => *count += 1,
            None => counts.push((*group, 1)),
        }
    }
    counts.into_iter().map(|(_, count)| count).collect()
}

fn results_path(output_dir: &Path, level: &str) -> String {
    output_dir.join(level).join("results.tsv").to_string_lossy().into_owned()
}

impl Stage for DeEbseq {
    fn name(&self) -> &'static str {
        "de_ebseq"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        Ok(LEVELS
            .iter()
            .filter(|(input, _, _)| ctx.inputs.contains_key(input))
            .map(|(_, output, level)| (*output, results_path(ctx.output_dir, level)))
            .collect())
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let groups = request.items("group");
        if groups.is_empty() {
            return Err(StageError::MissingArgument("group".to_string()));
        }
        let replicates = replicate_counts(&groups);
        let script = request.script(SCRIPT);

        let mut commands = Vec::new();
        for (input, _, level) in LEVELS {
            let Some(matrix) = request.optional(input) else {
                continue;
            };

            let ngvector = if *level == "gene" {
                NO_NGVECTOR
            } else {
                request.require("ngvector")?
            };

            let level_dir = request.output_dir.join(level);
            commands.push(
                ToolCommand::new("Rscript", &level_dir)
                    .arg(script.to_string_lossy())
                    .option("--ngvector", ngvector)
                    .option("--level", *level)
                    .option("--output-dir", level_dir.to_string_lossy())
                    .arg(matrix)
                    .args(replicates.iter().map(|n| n.to_string())),
            );
        }

        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Registry, Value};
    use crate::stages::testing::request;
    use crate::stages::ConvRsemToMatrix;

    #[test]
    fn test_replicate_counts_in_first_appearance_order() {
        assert_eq!(replicate_counts(&["ko", "ko", "ctrl", "ctrl", "ctrl"]), vec![2, 3]);
        assert_eq!(replicate_counts(&["a"]), vec![1]);
    }

    #[test]
    fn test_gene_level_uses_placeholder_ngvector() {
        let args = ValueMap::new()
            .with("group", Value::list(["a", "a", "b"]))
            .with("gene-mat-tsv", "m/gene/count_matrix.tsv");
        let options = ValueMap::new();

        let commands = DeEbseq.commands(&request(&args, "de", None, &options)).unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].display(),
            "Rscript /opt/rnaseqde/scripts/de_ebseq.R --ngvector # --level gene \
             --output-dir de/gene m/gene/count_matrix.tsv 2 1"
        );
    }

    #[test]
    fn test_transcript_level_requires_ngvector() {
        let args = ValueMap::new()
            .with("group", Value::list(["a", "b"]))
            .with("gene-mat-tsv", "m/gene/count_matrix.tsv")
            .with("transcript-mat-tsv", "m/transcript/count_matrix.tsv");
        let options = ValueMap::new();

        assert!(matches!(
            DeEbseq.commands(&request(&args, "de", None, &options)),
            Err(StageError::MissingArgument(k)) if k == "ngvector"
        ));
    }

    #[test]
    fn test_wired_after_matrix_conversion() {
        let mut registry = Registry::new();
        let seed = ValueMap::new()
            .with("group", Value::list(["a", "b"]))
            .with("gene-tsv", Value::list(["s1/q.genes.results", "s2/q.genes.results"]))
            .with("transcript-tsv", Value::list(["s1/q.isoforms.results", "s2/q.isoforms.results"]))
            .with("ebseq-ngvector", "/ref/ngvector.ngvec");
        let source = registry.add_source(seed, "gencode");
        let matrix = registry.add_task(&ConvRsemToMatrix, &[source]).unwrap();
        let de = registry.add_task(&DeEbseq, &[matrix]).unwrap();

        let inputs = registry.inputs(de).unwrap();
        assert_eq!(inputs.get_str("ngvector"), Some("/ref/ngvector.ngvec"));
        assert_eq!(
            inputs.get_str("transcript-mat-tsv"),
            Some("gencode/conv_rsem2mat/transcript/count_matrix.tsv")
        );

        // Own outputs replace the per-sample tables of the same name.
        let outputs = registry.outputs(de).unwrap();
        assert_eq!(outputs.get_str("gene-tsv"), Some("gencode/conv_rsem2mat/de_ebseq/gene/results.tsv"));
        assert_eq!(registry.shard_count(de).unwrap(), None);
    }
}
