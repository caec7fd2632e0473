use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{
    CompareContextConfig, CompareContextRow, ContextMode, DerivedUnit, InputDocument, PairingMode,
    PairingPolicy, StudySpec, TaskType,
};
use crate::seeded::seeded_shuffle;

/// Expands the raw dataset(s) into the documents the rest of the pipeline
/// sees. Non-compare studies pass the primary dataset through untouched;
/// compare studies are paired and flattened into `pair_n:A` / `pair_n:B`
/// synthetic documents.
pub fn build_compare_documents(
    spec: &StudySpec,
    primary: Vec<InputDocument>,
    secondary: Option<Vec<InputDocument>>,
) -> Result<Vec<InputDocument>> {
    if spec.task_type != TaskType::Compare {
        if secondary.is_some() {
            return Err(Error::Pairing(
                "a secondary dataset is only supported when task_type=compare".into(),
            ));
        }
        return Ok(primary);
    }

    let pairing = spec.compare_pairing.as_ref().ok_or_else(|| {
        Error::Pairing("compare_pairing is required when task_type=compare".into())
    })?;
    let seed = pairing.seed.clone().unwrap_or_else(|| spec.study_id.clone());

    if primary.is_empty() {
        return Err(Error::Pairing(
            "compare datasets must include at least one document".into(),
        ));
    }

    let pairs = match pairing.mode {
        PairingMode::SingleFile => {
            if secondary.is_some() {
                return Err(Error::Pairing(
                    "compare_pairing.mode=single_file does not take a secondary dataset".into(),
                ));
            }
            if primary.len() % 2 != 0 {
                return Err(Error::Pairing(format!(
                    "compare_pairing.mode=single_file requires an even document count, got {}",
                    primary.len()
                )));
            }

            let pool = match pairing.policy {
                PairingPolicy::ByIndex => primary,
                PairingPolicy::RandomPair => seeded_shuffle(&primary, &seed),
            };

            let mut pairs = Vec::with_capacity(pool.len() / 2);
            let mut documents = pool.into_iter();
            while let (Some(left), Some(right)) = (documents.next(), documents.next()) {
                pairs.push((left, right));
            }
            pairs
        }
        PairingMode::TwoFile => {
            let secondary = secondary.ok_or_else(|| {
                Error::Pairing("compare_pairing.mode=two_file requires a secondary dataset".into())
            })?;
            if primary.len() != secondary.len() {
                return Err(Error::Pairing(format!(
                    "compare_pairing.mode=two_file requires equal dataset lengths, got {} and {}",
                    primary.len(),
                    secondary.len()
                )));
            }

            let right_pool = match pairing.policy {
                PairingPolicy::ByIndex => secondary,
                PairingPolicy::RandomPair => seeded_shuffle(&secondary, &seed),
            };

            primary.into_iter().zip(right_pool).collect()
        }
    };

    Ok(flatten_pairs(pairs))
}

fn flatten_pairs(pairs: Vec<(InputDocument, InputDocument)>) -> Vec<InputDocument> {
    let mut documents = Vec::with_capacity(pairs.len() * 2);
    for (number, (left, right)) in pairs.into_iter().enumerate() {
        let pair_id = format!("pair_{}", number + 1);
        documents.push(into_pair_slot(left, &pair_id, "A"));
        documents.push(into_pair_slot(right, &pair_id, "B"));
    }
    documents
}

fn into_pair_slot(document: InputDocument, pair_id: &str, slot: &str) -> InputDocument {
    let InputDocument {
        doc_id,
        text,
        pair_id: _,
        mut meta,
        target_spans,
    } = document;

    meta.insert("compare_source_doc_id".to_string(), Value::String(doc_id));
    meta.insert("compare_slot".to_string(), Value::String(slot.to_string()));

    InputDocument {
        doc_id: format!("{pair_id}:{slot}"),
        text,
        pair_id: Some(pair_id.to_string()),
        meta,
        target_spans,
    }
}

/// Resolves the shared context string per unit. Returns `Ok(None)` when no
/// context mode is configured; every other outcome is all-or-nothing.
pub fn resolve_compare_context(
    spec: &StudySpec,
    units: &[DerivedUnit],
    sidecar_rows: Option<&[Value]>,
) -> Result<Option<Vec<CompareContextRow>>> {
    if spec.task_type != TaskType::Compare {
        return Ok(None);
    }
    let Some(context) = &spec.compare_context else {
        return Ok(None);
    };

    let rows = match context.mode {
        ContextMode::InlineMeta => {
            resolve_inline_meta(units, context.context_meta_key.as_deref().unwrap_or(""))?
        }
        ContextMode::Sidecar => {
            let rows = sidecar_rows.ok_or_else(|| {
                Error::ContextResolution(
                    "compare_context.mode=sidecar requires --context-sidecar".into(),
                )
            })?;
            resolve_sidecar(units, rows, context)?
        }
    };

    Ok(Some(rows))
}

fn resolve_inline_meta(units: &[DerivedUnit], key: &str) -> Result<Vec<CompareContextRow>> {
    units
        .iter()
        .map(|unit| {
            let context = unit
                .meta
                .get(key)
                .and_then(scalar_to_string)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    Error::ContextResolution(format!(
                        "unit {} is missing a non-blank meta.{key} context value",
                        unit.unit_id
                    ))
                })?;
            Ok(CompareContextRow {
                unit_id: unit.unit_id.clone(),
                pair_id: unit.pair_id.clone(),
                context,
            })
        })
        .collect()
}

fn resolve_sidecar(
    units: &[DerivedUnit],
    rows: &[Value],
    config: &CompareContextConfig,
) -> Result<Vec<CompareContextRow>> {
    let pair_field = config.pair_id_field();
    let context_field = config.context_field();

    let mut by_pair: BTreeMap<String, String> = BTreeMap::new();
    for row in rows {
        let pair_id = row
            .get(pair_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if pair_id.is_empty() {
            return Err(Error::ContextResolution(format!(
                "sidecar row is missing {pair_field}"
            )));
        }
        let context = row
            .get(context_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if context.is_empty() {
            return Err(Error::ContextResolution(format!(
                "sidecar row for {pair_field} {pair_id} is missing {context_field}"
            )));
        }
        if by_pair
            .insert(pair_id.to_string(), context.to_string())
            .is_some()
        {
            return Err(Error::ContextResolution(format!(
                "duplicate sidecar {pair_field} detected: {pair_id}"
            )));
        }
    }

    units
        .iter()
        .map(|unit| {
            let pair_id = unit
                .pair_id
                .as_deref()
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    Error::ContextResolution(format!(
                        "unit {} has no pair_id for sidecar context mapping",
                        unit.unit_id
                    ))
                })?;
            let context = by_pair.get(pair_id).ok_or_else(|| {
                Error::ContextResolution(format!("no sidecar context found for pair_id {pair_id}"))
            })?;
            Ok(CompareContextRow {
                unit_id: unit.unit_id.clone(),
                pair_id: Some(pair_id.to_string()),
                context: context.clone(),
            })
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
