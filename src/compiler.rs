use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::compare::{build_compare_documents, resolve_compare_context};
use crate::error::Error;
use crate::model::{
    AssignmentRow, CompareContextRow, DerivedUnit, EventLogRow, InputDocument, StudyManifest,
    StudySpec,
};
use crate::seeded::stable_hash;
use crate::unitize::derive_units;
use crate::validation::{validate_documents, validate_study_spec};
use crate::workplan::build_assignment_manifest;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const UNITS_FILE: &str = "units.jsonl";
pub const ANNOTATION_TEMPLATE_FILE: &str = "annotation_template.csv";
pub const EVENT_LOG_TEMPLATE_FILE: &str = "event_log_template.jsonl";
pub const COMPARE_CONTEXT_FILE: &str = "compare_context.jsonl";
pub const ASSIGNMENT_MANIFEST_FILE: &str = "assignment_manifest.jsonl";

const ANNOTATION_TEMPLATE_HEADER: [&str; 13] = [
    "study_id",
    "rubric_version",
    "annotator_id",
    "doc_id",
    "unit_id",
    "task_type",
    "response_payload",
    "confidence",
    "rationale",
    "condition_id",
    "compare_context",
    "created_at",
    "updated_at",
];

/// The in-memory result of one compile. Everything downstream (artifact
/// rendering, dry-run reporting) reads from this; nothing mutates it.
#[derive(Debug)]
pub struct CompiledStudy {
    pub spec: StudySpec,
    pub documents: Vec<InputDocument>,
    pub units: Vec<DerivedUnit>,
    pub compare_context: Option<Vec<CompareContextRow>>,
    pub assignments: Option<Vec<AssignmentRow>>,
}

pub struct Artifact {
    pub name: &'static str,
    pub contents: String,
}

/// Runs the whole pipeline: validate spec, expand compare pairs, validate
/// documents, derive units, resolve context, assign annotators. Any failure
/// aborts the compile; there is no partial success.
pub fn compile_study(
    spec: StudySpec,
    primary: Vec<InputDocument>,
    secondary: Option<Vec<InputDocument>>,
    sidecar_rows: Option<Vec<Value>>,
) -> Result<CompiledStudy, Error> {
    validate_study_spec(&spec)?;

    let documents = build_compare_documents(&spec, primary, secondary)?;
    validate_documents(&documents)?;

    let units = derive_units(&documents, spec.unitization_mode)?;
    let compare_context = resolve_compare_context(&spec, &units, sidecar_rows.as_deref())?;
    let assignments = spec
        .workplan
        .as_ref()
        .map(|workplan| build_assignment_manifest(&units, workplan));

    Ok(CompiledStudy {
        spec,
        documents,
        units,
        compare_context,
        assignments,
    })
}

#[derive(Serialize)]
struct BuildFingerprint<'a> {
    spec: &'a StudySpec,
    docs: &'a [InputDocument],
    units: &'a [DerivedUnit],
    #[serde(skip_serializing_if = "Option::is_none")]
    compare_context: Option<&'a [CompareContextRow]>,
}

pub fn build_manifest(study: &CompiledStudy) -> Result<StudyManifest> {
    let fingerprint = BuildFingerprint {
        spec: &study.spec,
        docs: &study.documents,
        units: &study.units,
        compare_context: study.compare_context.as_deref(),
    };
    let encoded =
        serde_json::to_string(&fingerprint).context("failed to serialize build fingerprint")?;

    let spec = &study.spec;
    Ok(StudyManifest {
        study_id: spec.study_id.clone(),
        rubric_version: spec.rubric_version.clone(),
        task_type: spec.task_type,
        unitization_mode: spec.unitization_mode,
        run_mode: spec.run_mode,
        question_count: spec.questions.len(),
        conditional_question_count: spec
            .questions
            .iter()
            .filter(|question| question.show_if.is_some())
            .count(),
        compare_pairing_mode: spec.compare_pairing.as_ref().map(|pairing| pairing.mode),
        compare_pairing_policy: spec.compare_pairing.as_ref().map(|pairing| pairing.policy),
        compare_context_mode: spec.compare_context.as_ref().map(|context| context.mode),
        document_count: study.documents.len(),
        unit_count: study.units.len(),
        build_id: stable_hash(&encoded),
    })
}

/// Serializes the fixed artifact set as byte-exact file contents. Identical
/// compiles render identical bytes, which is what the determinism tests pin.
pub fn render_artifacts(study: &CompiledStudy) -> Result<Vec<Artifact>> {
    let manifest = build_manifest(study)?;

    let mut artifacts = vec![
        Artifact {
            name: MANIFEST_FILE,
            contents: render_json_pretty(&manifest)?,
        },
        Artifact {
            name: UNITS_FILE,
            contents: render_jsonl(&study.units)?,
        },
        Artifact {
            name: ANNOTATION_TEMPLATE_FILE,
            contents: render_annotation_template(study),
        },
        Artifact {
            name: EVENT_LOG_TEMPLATE_FILE,
            contents: render_jsonl(&event_log_rows(&study.units))?,
        },
    ];

    if let Some(rows) = &study.compare_context {
        artifacts.push(Artifact {
            name: COMPARE_CONTEXT_FILE,
            contents: render_jsonl(rows)?,
        });
    }
    if let Some(rows) = &study.assignments {
        artifacts.push(Artifact {
            name: ASSIGNMENT_MANIFEST_FILE,
            contents: render_jsonl(rows)?,
        });
    }

    Ok(artifacts)
}

fn render_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    let mut rendered =
        serde_json::to_string_pretty(value).context("failed to serialize json artifact")?;
    rendered.push('\n');
    Ok(rendered)
}

fn render_jsonl<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut rendered = String::new();
    for row in rows {
        rendered
            .push_str(&serde_json::to_string(row).context("failed to serialize jsonl row")?);
        rendered.push('\n');
    }
    Ok(rendered)
}

fn render_annotation_template(study: &CompiledStudy) -> String {
    let mut lines = Vec::with_capacity(study.units.len() + 1);
    lines.push(ANNOTATION_TEMPLATE_HEADER.join(","));

    for unit in &study.units {
        let row = [
            study.spec.study_id.as_str(),
            study.spec.rubric_version.as_str(),
            "",
            unit.doc_id.as_str(),
            unit.unit_id.as_str(),
            study.spec.task_type.as_str(),
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ];
        lines.push(
            row.iter()
                .map(|cell| csv_escape(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n") + "\n"
}

fn csv_escape(cell: &str) -> String {
    if cell.contains('"') || cell.contains(',') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn event_log_rows(units: &[DerivedUnit]) -> Vec<EventLogRow> {
    units
        .iter()
        .map(|unit| EventLogRow {
            event_id: format!("{}:open", unit.unit_id),
            timestamp: String::new(),
            actor_id: String::new(),
            doc_id: unit.doc_id.clone(),
            unit_id: unit.unit_id.clone(),
            event_type: "unit_open".to_string(),
            event_payload: serde_json::Map::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AssignmentStrategy, CompareContextConfig, ComparePairingConfig, ContextMode, PairingMode,
        PairingPolicy, QuestionOption, ResponseType, RubricQuestion, RunMode, TaskType,
        UnitizationMode, WorkplanConfig,
    };

    fn label_spec() -> StudySpec {
        StudySpec {
            study_id: "demo".to_string(),
            rubric_version: "r1".to_string(),
            task_type: TaskType::Label,
            unitization_mode: UnitizationMode::SentenceStep,
            run_mode: RunMode::Participant,
            questions: vec![RubricQuestion {
                question_id: "q1".to_string(),
                prompt: "Is this step correct?".to_string(),
                response_type: ResponseType::SingleSelect,
                options: vec![
                    QuestionOption {
                        value: "yes".to_string(),
                        label: "Yes".to_string(),
                    },
                    QuestionOption {
                        value: "no".to_string(),
                        label: "No".to_string(),
                    },
                ],
                min_select: None,
                max_select: None,
                max_chars: None,
                show_if: None,
            }],
            workplan: None,
            compare_pairing: None,
            compare_context: None,
        }
    }

    fn document(doc_id: &str, text: &str) -> InputDocument {
        InputDocument {
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            pair_id: None,
            meta: serde_json::Map::new(),
            target_spans: Vec::new(),
        }
    }

    fn documents() -> Vec<InputDocument> {
        vec![
            document("d1", "Alpha. Beta!"),
            document("d2", "Gamma? Delta."),
        ]
    }

    #[test]
    fn compile_produces_the_base_artifact_set() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let artifacts = render_artifacts(&study).unwrap();

        let names: Vec<&str> = artifacts.iter().map(|artifact| artifact.name).collect();
        assert_eq!(
            names,
            vec![
                MANIFEST_FILE,
                UNITS_FILE,
                ANNOTATION_TEMPLATE_FILE,
                EVENT_LOG_TEMPLATE_FILE,
            ]
        );
    }

    #[test]
    fn compile_is_deterministic_byte_for_byte() {
        let mut spec = label_spec();
        spec.workplan = Some(WorkplanConfig {
            annotator_ids: vec!["ann_a".to_string(), "ann_b".to_string()],
            replication_factor: Some(2),
            assignment_strategy: AssignmentStrategy::LoadBalanced,
            assignment_weights: Default::default(),
            stratify_by_meta_key: None,
            assignment_seed: Some("seed_1".to_string()),
        });

        let first = render_artifacts(
            &compile_study(spec.clone(), documents(), None, None).unwrap(),
        )
        .unwrap();
        let second = render_artifacts(
            &compile_study(spec, documents(), None, None).unwrap(),
        )
        .unwrap();

        assert_eq!(first.len(), second.len());
        for (left, right) in first.iter().zip(second.iter()) {
            assert_eq!(left.name, right.name);
            assert_eq!(left.contents, right.contents);
        }
    }

    #[test]
    fn manifest_counts_reflect_the_compiled_study() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let manifest = build_manifest(&study).unwrap();

        assert_eq!(manifest.document_count, 2);
        assert_eq!(manifest.unit_count, 4);
        assert_eq!(manifest.question_count, 1);
        assert_eq!(manifest.conditional_question_count, 0);
        assert_eq!(manifest.build_id.len(), 8);
        assert!(manifest.build_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(manifest.compare_pairing_mode.is_none());
    }

    #[test]
    fn build_id_changes_when_the_input_changes() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let other = compile_study(
            label_spec(),
            vec![document("d1", "Alpha. Beta!"), document("d2", "Changed.")],
            None,
            None,
        )
        .unwrap();

        let left = build_manifest(&study).unwrap();
        let right = build_manifest(&other).unwrap();
        assert_ne!(left.build_id, right.build_id);
    }

    #[test]
    fn manifest_json_omits_compare_echoes_for_plain_studies() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let rendered = render_json_pretty(&build_manifest(&study).unwrap()).unwrap();
        assert!(!rendered.contains("compare_pairing_mode"));
    }

    #[test]
    fn annotation_template_has_the_fixed_header_and_blank_columns() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let rendered = render_annotation_template(&study);
        let mut lines = rendered.lines();

        assert_eq!(
            lines.next(),
            Some(
                "study_id,rubric_version,annotator_id,doc_id,unit_id,task_type,\
                 response_payload,confidence,rationale,condition_id,compare_context,\
                 created_at,updated_at"
            )
        );
        assert_eq!(lines.next(), Some("demo,r1,,d1,d1:u0,label,,,,,,,"));
    }

    #[test]
    fn event_log_template_holds_one_open_event_per_unit() {
        let study = compile_study(label_spec(), documents(), None, None).unwrap();
        let rendered = render_jsonl(&event_log_rows(&study.units)).unwrap();
        let first: Value = serde_json::from_str(rendered.lines().next().unwrap()).unwrap();

        assert_eq!(first["event_id"], "d1:u0:open");
        assert_eq!(first["event_type"], "unit_open");
        assert_eq!(first["timestamp"], "");
        assert!(first["event_payload"].as_object().unwrap().is_empty());
        assert_eq!(rendered.lines().count(), study.units.len());
    }

    #[test]
    fn compare_compile_emits_context_and_assignment_artifacts() {
        let spec = StudySpec {
            study_id: "cmp".to_string(),
            rubric_version: "r1".to_string(),
            task_type: TaskType::Compare,
            unitization_mode: UnitizationMode::Document,
            run_mode: RunMode::Ra,
            questions: Vec::new(),
            workplan: Some(WorkplanConfig {
                annotator_ids: vec!["ann_a".to_string(), "ann_b".to_string()],
                replication_factor: None,
                assignment_strategy: AssignmentStrategy::RoundRobin,
                assignment_weights: Default::default(),
                stratify_by_meta_key: None,
                assignment_seed: None,
            }),
            compare_pairing: Some(ComparePairingConfig {
                mode: PairingMode::SingleFile,
                policy: PairingPolicy::ByIndex,
                seed: None,
            }),
            compare_context: Some(CompareContextConfig {
                mode: ContextMode::Sidecar,
                context_meta_key: None,
                sidecar_pair_id_field: None,
                sidecar_context_field: None,
            }),
        };
        let sidecar = vec![serde_json::json!({"pair_id": "pair_1", "context": "Shared prompt"})];

        let study = compile_study(
            spec,
            vec![document("d1", "Left answer."), document("d2", "Right answer.")],
            None,
            Some(sidecar),
        )
        .unwrap();
        let artifacts = render_artifacts(&study).unwrap();

        let names: Vec<&str> = artifacts.iter().map(|artifact| artifact.name).collect();
        assert!(names.contains(&COMPARE_CONTEXT_FILE));
        assert!(names.contains(&ASSIGNMENT_MANIFEST_FILE));

        let manifest = build_manifest(&study).unwrap();
        assert_eq!(manifest.document_count, 2);
        assert_eq!(manifest.compare_pairing_mode, Some(PairingMode::SingleFile));
        assert_eq!(manifest.compare_context_mode, Some(ContextMode::Sidecar));
    }

    #[test]
    fn a_failing_step_aborts_the_whole_compile() {
        let mut spec = label_spec();
        spec.unitization_mode = UnitizationMode::TargetSpan;
        let err = compile_study(spec, documents(), None, None).unwrap_err();
        assert!(matches!(err, Error::Unitization(_)));
    }

    #[test]
    fn csv_escape_quotes_embedded_delimiters() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
