use anyhow::Result;
use tracing::info;

use crate::cli::CompileArgs;
use crate::compiler::{build_manifest, compile_study, render_artifacts};
use crate::dataset::{read_documents, read_sidecar_rows, read_study_spec};
use crate::util::{ensure_directory, sha256_file, write_text_file};

pub fn run(args: CompileArgs) -> Result<()> {
    let spec = read_study_spec(&args.spec)?;
    let spec_digest = sha256_file(&args.spec)?;
    info!(
        path = %args.spec.display(),
        sha256 = %spec_digest,
        study_id = %spec.study_id,
        task_type = spec.task_type.as_str(),
        "loaded study spec"
    );

    let primary = read_documents(&args.dataset)?;
    let dataset_digest = sha256_file(&args.dataset)?;
    info!(
        path = %args.dataset.display(),
        sha256 = %dataset_digest,
        document_count = primary.len(),
        "loaded primary dataset"
    );

    let secondary = match &args.dataset_b {
        Some(path) => {
            let documents = read_documents(path)?;
            let digest = sha256_file(path)?;
            info!(
                path = %path.display(),
                sha256 = %digest,
                document_count = documents.len(),
                "loaded secondary dataset"
            );
            Some(documents)
        }
        None => None,
    };

    let sidecar_rows = match &args.context_sidecar {
        Some(path) => {
            let rows = read_sidecar_rows(path)?;
            info!(path = %path.display(), row_count = rows.len(), "loaded context sidecar");
            Some(rows)
        }
        None => None,
    };

    let study = compile_study(spec, primary, secondary, sidecar_rows)?;
    let manifest = build_manifest(&study)?;
    let artifacts = render_artifacts(&study)?;

    ensure_directory(&args.out)?;
    for artifact in &artifacts {
        let path = args.out.join(artifact.name);
        write_text_file(&path, &artifact.contents)?;
        info!(path = %path.display(), bytes = artifact.contents.len(), "wrote artifact");
    }

    info!(
        out = %args.out.display(),
        document_count = manifest.document_count,
        unit_count = manifest.unit_count,
        build_id = %manifest.build_id,
        "compile completed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const SPEC_JSON: &str = r#"{
        "study_id": "demo",
        "rubric_version": "r1",
        "task_type": "label",
        "unitization_mode": "sentence_step",
        "run_mode": "participant",
        "questions": [
            {
                "question_id": "q1",
                "prompt": "Is this step correct?",
                "response_type": "single_select",
                "options": [
                    {"value": "yes", "label": "Yes"},
                    {"value": "no", "label": "No"}
                ]
            }
        ],
        "workplan": {
            "annotator_ids": ["ann_a", "ann_b"],
            "replication_factor": 2,
            "assignment_strategy": "round_robin"
        }
    }"#;

    const DATASET_JSONL: &str = concat!(
        r#"{"doc_id":"d1","text":"Alpha. Beta!"}"#,
        "\n",
        r#"{"doc_id":"d2","text":"Gamma? Delta."}"#,
        "\n",
    );

    fn compile_into(scratch: &Path, out_name: &str) -> std::path::PathBuf {
        let spec_path = scratch.join("spec.json");
        let dataset_path = scratch.join("docs.jsonl");
        fs::write(&spec_path, SPEC_JSON).expect("write spec");
        fs::write(&dataset_path, DATASET_JSONL).expect("write dataset");

        let out = scratch.join(out_name);
        run(CompileArgs {
            spec: spec_path,
            dataset: dataset_path,
            out: out.clone(),
            dataset_b: None,
            context_sidecar: None,
        })
        .expect("compile");
        out
    }

    #[test]
    fn compile_writes_identical_artifacts_across_runs() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let first = compile_into(scratch.path(), "out_a");
        let second = compile_into(scratch.path(), "out_b");

        for name in [
            "manifest.json",
            "units.jsonl",
            "annotation_template.csv",
            "event_log_template.jsonl",
            "assignment_manifest.jsonl",
        ] {
            let left = fs::read(first.join(name)).expect("first artifact");
            let right = fs::read(second.join(name)).expect("second artifact");
            assert_eq!(left, right, "artifact {name} differs between runs");
        }
    }

    #[test]
    fn compile_fails_on_duplicate_doc_ids() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let spec_path = scratch.path().join("spec.json");
        let dataset_path = scratch.path().join("docs.jsonl");
        fs::write(&spec_path, SPEC_JSON).expect("write spec");
        fs::write(
            &dataset_path,
            concat!(
                r#"{"doc_id":"d1","text":"Alpha."}"#,
                "\n",
                r#"{"doc_id":"d1","text":"Beta."}"#,
                "\n",
            ),
        )
        .expect("write dataset");

        let err = run(CompileArgs {
            spec: spec_path,
            dataset: dataset_path,
            out: scratch.path().join("out"),
            dataset_b: None,
            context_sidecar: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("d1"));
    }
}
