use anyhow::Result;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::compiler::compile_study;
use crate::dataset::{read_documents, read_sidecar_rows, read_study_spec};
use crate::validation::validate_study_spec;

/// Dry-run of the compile pipeline: everything is checked and derived, but
/// nothing is written.
pub fn run(args: ValidateArgs) -> Result<()> {
    let spec = read_study_spec(&args.spec)?;
    validate_study_spec(&spec)?;
    info!(
        path = %args.spec.display(),
        study_id = %spec.study_id,
        task_type = spec.task_type.as_str(),
        question_count = spec.questions.len(),
        "study spec is valid"
    );

    let Some(dataset_path) = &args.dataset else {
        return Ok(());
    };

    let primary = read_documents(dataset_path)?;
    let secondary = args
        .dataset_b
        .as_ref()
        .map(|path| read_documents(path))
        .transpose()?;
    let sidecar_rows = args
        .context_sidecar
        .as_ref()
        .map(|path| read_sidecar_rows(path))
        .transpose()?;

    let study = compile_study(spec, primary, secondary, sidecar_rows)?;
    info!(
        document_count = study.documents.len(),
        unit_count = study.units.len(),
        context_row_count = study
            .compare_context
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0),
        assignment_count = study.assignments.as_ref().map(Vec::len).unwrap_or(0),
        "dry-run compile succeeded"
    );

    Ok(())
}
