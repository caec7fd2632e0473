use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{
    AssignmentStrategy, ContextMode, InputDocument, ResponseType, RubricQuestion, StudySpec,
    TaskType, WorkplanConfig,
};

fn invalid(message: impl Into<String>) -> Error {
    Error::SpecValidation(message.into())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn validate_study_spec(spec: &StudySpec) -> Result<()> {
    if is_blank(&spec.study_id) {
        return Err(invalid("study_id is required"));
    }
    if is_blank(&spec.rubric_version) {
        return Err(invalid("rubric_version is required"));
    }

    validate_compare_config(spec)?;

    if let Some(workplan) = &spec.workplan {
        validate_workplan(workplan)?;
    }

    for (index, question) in spec.questions.iter().enumerate() {
        validate_question(spec, index, question)?;
    }

    Ok(())
}

fn validate_compare_config(spec: &StudySpec) -> Result<()> {
    if spec.task_type != TaskType::Compare {
        if spec.compare_pairing.is_some() {
            return Err(invalid("compare_pairing is only allowed when task_type=compare"));
        }
        if spec.compare_context.is_some() {
            return Err(invalid("compare_context is only allowed when task_type=compare"));
        }
        return Ok(());
    }

    let pairing = spec
        .compare_pairing
        .as_ref()
        .ok_or_else(|| invalid("compare_pairing is required when task_type=compare"))?;
    if let Some(seed) = &pairing.seed {
        if is_blank(seed) {
            return Err(invalid("compare_pairing.seed must not be blank"));
        }
    }

    if let Some(context) = &spec.compare_context {
        match context.mode {
            ContextMode::InlineMeta => {
                if context.context_meta_key.as_deref().is_none_or(is_blank) {
                    return Err(invalid(
                        "compare_context.context_meta_key is required for mode=inline_meta",
                    ));
                }
            }
            ContextMode::Sidecar => {
                if let Some(field) = &context.sidecar_pair_id_field {
                    if is_blank(field) {
                        return Err(invalid(
                            "compare_context.sidecar_pair_id_field must not be blank",
                        ));
                    }
                }
                if let Some(field) = &context.sidecar_context_field {
                    if is_blank(field) {
                        return Err(invalid(
                            "compare_context.sidecar_context_field must not be blank",
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

fn validate_workplan(workplan: &WorkplanConfig) -> Result<()> {
    if workplan.annotator_ids.is_empty() {
        return Err(invalid("workplan.annotator_ids must not be empty"));
    }

    let mut seen = HashSet::new();
    for annotator_id in &workplan.annotator_ids {
        if is_blank(annotator_id) {
            return Err(invalid("workplan.annotator_ids must not contain blank entries"));
        }
        if !seen.insert(annotator_id.as_str()) {
            return Err(invalid(format!(
                "workplan.annotator_ids contains duplicate entry: {annotator_id}"
            )));
        }
    }

    if let Some(factor) = workplan.replication_factor {
        if factor < 1 {
            return Err(invalid("workplan.replication_factor must be >= 1"));
        }
        if factor as usize > workplan.annotator_ids.len() {
            return Err(invalid(format!(
                "workplan.replication_factor {} exceeds annotator count {}",
                factor,
                workplan.annotator_ids.len()
            )));
        }
    }

    match workplan.assignment_strategy {
        AssignmentStrategy::Weighted => {
            if workplan.assignment_weights.is_empty() {
                return Err(invalid(
                    "workplan.assignment_weights is required for assignment_strategy=weighted",
                ));
            }
            for (annotator_id, weight) in &workplan.assignment_weights {
                if !weight.is_finite() || *weight <= 0.0 {
                    return Err(invalid(format!(
                        "workplan.assignment_weights entry for {annotator_id} must be a positive number"
                    )));
                }
            }
        }
        AssignmentStrategy::StratifiedRoundRobin => {
            if workplan.stratify_by_meta_key.as_deref().is_none_or(is_blank) {
                return Err(invalid(
                    "workplan.stratify_by_meta_key is required for assignment_strategy=stratified_round_robin",
                ));
            }
        }
        AssignmentStrategy::RoundRobin | AssignmentStrategy::LoadBalanced => {}
    }

    if let Some(seed) = &workplan.assignment_seed {
        if is_blank(seed) {
            return Err(invalid("workplan.assignment_seed must not be blank"));
        }
    }

    Ok(())
}

fn validate_question(spec: &StudySpec, index: usize, question: &RubricQuestion) -> Result<()> {
    if is_blank(&question.question_id) {
        return Err(invalid(format!("question {index} is missing question_id")));
    }
    let question_id = question.question_id.as_str();

    if spec.questions[..index]
        .iter()
        .any(|earlier| earlier.question_id == question.question_id)
    {
        return Err(invalid(format!("duplicate question_id: {question_id}")));
    }
    if is_blank(&question.prompt) {
        return Err(invalid(format!("question {question_id} is missing prompt")));
    }

    let allowed: &[ResponseType] = match spec.task_type {
        TaskType::Label => &[ResponseType::SingleSelect, ResponseType::MultiSelect],
        TaskType::Annotate => &[ResponseType::FreeText],
        TaskType::Compare => &[ResponseType::Choice, ResponseType::ChoiceWithRationale],
    };
    if !allowed.contains(&question.response_type) {
        return Err(invalid(format!(
            "question {question_id}: response_type {} is not allowed for task_type {}",
            question.response_type.as_str(),
            spec.task_type.as_str()
        )));
    }

    if question.response_type.requires_options() {
        validate_options(question_id, question)?;
    }

    if question.response_type == ResponseType::MultiSelect {
        if let Some(max) = question.max_select {
            if max < 1 {
                return Err(invalid(format!(
                    "question {question_id}: max_select must be >= 1"
                )));
            }
            if max as usize > question.options.len() {
                return Err(invalid(format!(
                    "question {question_id}: max_select {} exceeds option count {}",
                    max,
                    question.options.len()
                )));
            }
        }
        if let (Some(min), Some(max)) = (question.min_select, question.max_select) {
            if min > max {
                return Err(invalid(format!(
                    "question {question_id}: min_select {min} exceeds max_select {max}"
                )));
            }
        }
    }

    if question.response_type == ResponseType::FreeText {
        if let Some(max_chars) = question.max_chars {
            if max_chars < 1 {
                return Err(invalid(format!(
                    "question {question_id}: max_chars must be >= 1"
                )));
            }
        }
    }

    if let Some(show_if) = &question.show_if {
        let parent = spec.questions[..index]
            .iter()
            .find(|earlier| earlier.question_id == show_if.question_id)
            .ok_or_else(|| {
                invalid(format!(
                    "question {question_id}: show_if references {} which is not defined earlier",
                    show_if.question_id
                ))
            })?;
        if !parent.response_type.requires_options() {
            return Err(invalid(format!(
                "question {question_id}: show_if parent {} has no discrete options",
                show_if.question_id
            )));
        }
        if !parent.options.iter().any(|option| option.value == show_if.value) {
            return Err(invalid(format!(
                "question {question_id}: show_if value {} is not an option value of {}",
                show_if.value, show_if.question_id
            )));
        }
    }

    Ok(())
}

fn validate_options(question_id: &str, question: &RubricQuestion) -> Result<()> {
    if question.options.len() < 2 {
        return Err(invalid(format!(
            "question {question_id} needs at least 2 options"
        )));
    }

    let mut values = HashSet::new();
    let mut labels = HashSet::new();
    for option in &question.options {
        if is_blank(&option.value) {
            return Err(invalid(format!(
                "question {question_id} has an option with a blank value"
            )));
        }
        if is_blank(&option.label) {
            return Err(invalid(format!(
                "question {question_id} has an option with a blank label"
            )));
        }
        if !values.insert(option.value.as_str()) {
            return Err(invalid(format!(
                "question {question_id} has a duplicate option value: {}",
                option.value
            )));
        }
        if !labels.insert(option.label.as_str()) {
            return Err(invalid(format!(
                "question {question_id} has a duplicate option label: {}",
                option.label
            )));
        }
    }

    Ok(())
}

pub fn validate_documents(documents: &[InputDocument]) -> Result<()> {
    let mut seen = HashSet::new();
    for document in documents {
        if is_blank(&document.doc_id) {
            return Err(Error::DatasetValidation(
                "every document needs a non-blank doc_id".into(),
            ));
        }
        if !seen.insert(document.doc_id.as_str()) {
            return Err(Error::DatasetValidation(format!(
                "duplicate doc_id detected: {}",
                document.doc_id
            )));
        }
        if is_blank(&document.text) {
            return Err(Error::DatasetValidation(format!(
                "document {} has empty text",
                document.doc_id
            )));
        }
        for (key, value) in &document.meta {
            if value.is_array() || value.is_object() {
                return Err(Error::DatasetValidation(format!(
                    "document {}: meta.{key} must be a scalar value",
                    document.doc_id
                )));
            }
        }
    }
    Ok(())
}
