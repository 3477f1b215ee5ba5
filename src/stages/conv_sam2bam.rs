//! SAM to coordinate-sorted BAM with samtools.

use std::path::{Path, PathBuf};

use crate::error::{GraphError, StageError};
use crate::graph::stage::unit_of;
use crate::graph::{ArraySpec, Binding, ShardRequest, Stage, StageContext, ToolCommand, Value, ValueMap};

const BINDINGS: &[Binding] = &[Binding::required("sam", "sam")];

#[derive(Debug, Clone, Copy)]
pub struct ConvSamToBam;

/// `<output_dir>/<sample>/<stem>.bam` for a per-sample SAM file.
fn bam_for(output_dir: &Path, sam: &str) -> PathBuf {
    let stem = Path::new(sam)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| sam.to_string());
    output_dir.join(unit_of(sam)).join(format!("{}.bam", stem))
}

impl Stage for ConvSamToBam {
    fn name(&self) -> &'static str {
        "conv_sam2bam"
    }

    fn bindings(&self) -> &'static [Binding] {
        BINDINGS
    }

    fn array(&self) -> Option<ArraySpec> {
        Some(ArraySpec::over("sam"))
    }

    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError> {
        let bams = ctx
            .inputs
            .get_items("sam")
            .into_iter()
            .map(|sam| bam_for(ctx.output_dir, sam).to_string_lossy().into_owned());
        Ok(ValueMap::new().with("bam", Value::list(bams)))
    }

    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError> {
        Ok(request
            .scattered("sam")?
            .into_iter()
            .map(|sam| {
                let bam = bam_for(&request.output_dir, sam);
                let log_dir = request.unit_dir(&unit_of(sam));
                ToolCommand::new("samtools", log_dir)
                    .arg("sort")
                    .options(request.options)
                    .arg(sam)
                    .option("-o", bam.to_string_lossy())
            })
            .collect())
    }
}
