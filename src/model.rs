use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Label,
    Annotate,
    Compare,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Annotate => "annotate",
            Self::Compare => "compare",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitizationMode {
    Document,
    SentenceStep,
    TargetSpan,
}

impl UnitizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::SentenceStep => "sentence_step",
            Self::TargetSpan => "target_span",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Participant,
    Ra,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Ra => "ra",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    SingleSelect,
    MultiSelect,
    FreeText,
    Choice,
    ChoiceWithRationale,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleSelect => "single_select",
            Self::MultiSelect => "multi_select",
            Self::FreeText => "free_text",
            Self::Choice => "choice",
            Self::ChoiceWithRationale => "choice_with_rationale",
        }
    }

    pub fn requires_options(self) -> bool {
        matches!(
            self,
            Self::SingleSelect | Self::MultiSelect | Self::Choice | Self::ChoiceWithRationale
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    #[default]
    RoundRobin,
    LoadBalanced,
    Weighted,
    StratifiedRoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    SingleFile,
    TwoFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPolicy {
    ByIndex,
    RandomPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    InlineMeta,
    Sidecar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowIf {
    pub question_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricQuestion {
    pub question_id: String,
    pub prompt: String,
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_select: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_select: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<ShowIf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkplanConfig {
    pub annotator_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,
    #[serde(default)]
    pub assignment_strategy: AssignmentStrategy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assignment_weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratify_by_meta_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_seed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparePairingConfig {
    pub mode: PairingMode,
    pub policy: PairingPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareContextConfig {
    pub mode: ContextMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_meta_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_pair_id_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_context_field: Option<String>,
}

impl CompareContextConfig {
    pub fn pair_id_field(&self) -> &str {
        self.sidecar_pair_id_field.as_deref().unwrap_or("pair_id")
    }

    pub fn context_field(&self) -> &str {
        self.sidecar_context_field.as_deref().unwrap_or("context")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySpec {
    pub study_id: String,
    pub rubric_version: String,
    pub task_type: TaskType,
    pub unitization_mode: UnitizationMode,
    pub run_mode: RunMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<RubricQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workplan: Option<WorkplanConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_pairing: Option<ComparePairingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_context: Option<CompareContextConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpan {
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub doc_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_spans: Vec<TargetSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedUnit {
    pub doc_id: String,
    pub unit_id: String,
    pub unit_type: UnitizationMode,
    pub index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub unit_text: String,
    pub segmentation_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareContextRow {
    pub unit_id: String,
    pub pair_id: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub assignment_id: String,
    pub annotator_id: String,
    pub doc_id: String,
    pub unit_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogRow {
    pub event_id: String,
    pub timestamp: String,
    pub actor_id: String,
    pub doc_id: String,
    pub unit_id: String,
    pub event_type: String,
    pub event_payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyManifest {
    pub study_id: String,
    pub rubric_version: String,
    pub task_type: TaskType,
    pub unitization_mode: UnitizationMode,
    pub run_mode: RunMode,
    pub question_count: usize,
    pub conditional_question_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_pairing_mode: Option<PairingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_pairing_policy: Option<PairingPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_context_mode: Option<ContextMode>,
    pub document_count: usize,
    pub unit_count: usize,
    pub build_id: String,
}
