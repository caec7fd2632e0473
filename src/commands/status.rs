use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::compiler::{
    ANNOTATION_TEMPLATE_FILE, ASSIGNMENT_MANIFEST_FILE, COMPARE_CONTEXT_FILE,
    EVENT_LOG_TEMPLATE_FILE, MANIFEST_FILE, UNITS_FILE,
};
use crate::model::StudyManifest;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_path = args.out.join(MANIFEST_FILE);

    if !manifest_path.exists() {
        warn!(path = %manifest_path.display(), "manifest missing; nothing compiled here yet");
        return Ok(());
    }

    let raw = fs::read(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: StudyManifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    info!(
        study_id = %manifest.study_id,
        rubric_version = %manifest.rubric_version,
        task_type = manifest.task_type.as_str(),
        unitization_mode = manifest.unitization_mode.as_str(),
        run_mode = manifest.run_mode.as_str(),
        question_count = manifest.question_count,
        conditional_question_count = manifest.conditional_question_count,
        document_count = manifest.document_count,
        unit_count = manifest.unit_count,
        build_id = %manifest.build_id,
        "loaded compile manifest"
    );

    for name in [UNITS_FILE, ANNOTATION_TEMPLATE_FILE, EVENT_LOG_TEMPLATE_FILE] {
        let path = args.out.join(name);
        if !path.exists() {
            warn!(path = %path.display(), "expected artifact missing");
        }
    }
    for name in [COMPARE_CONTEXT_FILE, ASSIGNMENT_MANIFEST_FILE] {
        let path = args.out.join(name);
        if path.exists() {
            info!(path = %path.display(), "optional artifact present");
        }
    }

    Ok(())
}
