//! Merges per-sample RSEM tables into gene and transcript count matrices.

use std::path::Path;

use crate::error::{GraphError, StageError};
use crate::graph::{Binding, ShardRequest, Stage, StageContext, ToolCommand, ValueMap};

const BINDINGS: &[Binding] = &[
    Binding::required("gene-tsv", "gene-tsv"),
    Binding::optional("transcript-tsv", "transcript-tsv"),
];

/// Quantification levels: (input key, output key, directory).
const LEVELS: &[(&str, &str, &str)] = &[
    ("gene-tsv", "gene-mat-tsv", "gene"),
    ("transcript-tsv", "transcript-mat-tsv", "transcript"),
];

const MATRIX: &str = "count_matrix.tsv";

#[derive(Debug, Clone, Copy)]
pub struct ConvRsemToMatrix;

fn matrix_path(output_dir: &Path, level: &str) -> String {
    output_dir.join(level).join(MATRIX).to_string_lossy().into_owned()
}

impl Stage for ConvRsemToMatrix {
    fn name(&self) -> &'static str {
        "conv_rsem2mat"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        Ok(LEVELS
            .iter()
            .filter(|(input, _, _)| ctx.inputs.contains_key(input))
            .map(|(_, output, level)| (*output, matrix_path(ctx.output_dir, level)))
            .collect())
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        let commands = LEVELS
            .iter()
            .filter_map(|(input, _, level)| {
                let tables = request.items(input);
                if tables.is_empty() {
                    return None;
                }
                let level_dir = request.output_dir.join(level);
                Some(
                    ToolCommand::new("rsem-generate-data-matrix", &level_dir)
                        .options(request.options)
                        .stdout_to(level_dir.join(MATRIX))
                        .args(tables),
                )
            })
            .collect::<Vec<_>>();

        if commands.is_empty() {
            return Err(StageError::MissingArgument("gene-tsv".to_string()));
        }
        Ok(commands)
    }
}
