use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{AssignmentRow, AssignmentStrategy, DerivedUnit, WorkplanConfig};
use crate::seeded::stable_hash;

/// Distributes units across the annotator pool. Deterministic for a fixed
/// `(units order, workplan)` pair; no annotator is ever assigned twice to
/// the same unit.
pub fn build_assignment_manifest(
    units: &[DerivedUnit],
    workplan: &WorkplanConfig,
) -> Vec<AssignmentRow> {
    if workplan.annotator_ids.is_empty() {
        return Vec::new();
    }
    let replication = replication_factor(workplan);

    match workplan.assignment_strategy {
        AssignmentStrategy::RoundRobin => {
            assign_round_robin(units, &workplan.annotator_ids, replication)
        }
        AssignmentStrategy::LoadBalanced => assign_by_load(units, workplan, replication, false),
        AssignmentStrategy::Weighted => assign_by_load(units, workplan, replication, true),
        AssignmentStrategy::StratifiedRoundRobin => {
            assign_stratified(units, workplan, replication)
        }
    }
}

fn replication_factor(workplan: &WorkplanConfig) -> usize {
    (workplan.replication_factor.unwrap_or(1) as usize)
        .clamp(1, workplan.annotator_ids.len())
}

fn push_row(rows: &mut Vec<AssignmentRow>, unit: &DerivedUnit, annotator_id: &str) {
    rows.push(AssignmentRow {
        assignment_id: format!("{}:{annotator_id}", unit.unit_id),
        annotator_id: annotator_id.to_string(),
        doc_id: unit.doc_id.clone(),
        unit_id: unit.unit_id.clone(),
    });
}

/// Cyclic selection keyed on the unit's document-relative index.
fn assign_round_robin(
    units: &[DerivedUnit],
    annotators: &[String],
    replication: usize,
) -> Vec<AssignmentRow> {
    let mut rows = Vec::with_capacity(units.len() * replication);
    for unit in units {
        let start = unit.index % annotators.len();
        for offset in 0..replication {
            push_row(&mut rows, unit, &annotators[(start + offset) % annotators.len()]);
        }
    }
    rows
}

/// Greedy least-loaded selection. With `weighted`, the comparison key is
/// `load / weight` so higher-weight annotators absorb proportionally more
/// units. Ties break on the stable hash of `seed:unit_id:annotator_id`.
fn assign_by_load(
    units: &[DerivedUnit],
    workplan: &WorkplanConfig,
    replication: usize,
    weighted: bool,
) -> Vec<AssignmentRow> {
    let annotators = &workplan.annotator_ids;
    let seed = workplan.assignment_seed.as_deref().unwrap_or("");
    let mut loads: BTreeMap<&str, u64> = annotators
        .iter()
        .map(|annotator_id| (annotator_id.as_str(), 0))
        .collect();

    let mut rows = Vec::with_capacity(units.len() * replication);
    for unit in units {
        let mut chosen: Vec<&str> = Vec::with_capacity(replication);
        for _ in 0..replication {
            let pick = annotators
                .iter()
                .map(String::as_str)
                .filter(|candidate| !chosen.contains(candidate))
                .min_by(|left, right| {
                    let by_load = if weighted {
                        let left_cost = loads[*left] as f64 / weight_of(workplan, left);
                        let right_cost = loads[*right] as f64 / weight_of(workplan, right);
                        left_cost.total_cmp(&right_cost)
                    } else {
                        loads[*left].cmp(&loads[*right])
                    };
                    by_load.then_with(|| {
                        tie_break(seed, &unit.unit_id, left)
                            .cmp(&tie_break(seed, &unit.unit_id, right))
                    })
                });
            let Some(pick) = pick else { break };
            if let Some(load) = loads.get_mut(pick) {
                *load += 1;
            }
            chosen.push(pick);
        }
        for annotator_id in &chosen {
            push_row(&mut rows, unit, annotator_id);
        }
    }
    rows
}

fn weight_of(workplan: &WorkplanConfig, annotator_id: &str) -> f64 {
    workplan
        .assignment_weights
        .get(annotator_id)
        .copied()
        .filter(|weight| weight.is_finite() && *weight > 0.0)
        .unwrap_or(1.0)
}

fn tie_break(seed: &str, unit_id: &str, annotator_id: &str) -> String {
    stable_hash(&format!("{seed}:{unit_id}:{annotator_id}"))
}

/// Independent round robin per stratum, so coverage balances within each
/// metadata category instead of globally. Units lacking the key share one
/// reserved stratum (`None`); an empty key folds everything into a single
/// stratum.
fn assign_stratified(
    units: &[DerivedUnit],
    workplan: &WorkplanConfig,
    replication: usize,
) -> Vec<AssignmentRow> {
    let annotators = &workplan.annotator_ids;
    let key = workplan
        .stratify_by_meta_key
        .as_deref()
        .unwrap_or("")
        .trim();

    let mut counters: BTreeMap<Option<String>, usize> = BTreeMap::new();
    let mut rows = Vec::with_capacity(units.len() * replication);
    for unit in units {
        let stratum = if key.is_empty() {
            Some(String::new())
        } else {
            unit.meta.get(key).and_then(stratum_label)
        };

        let counter = counters.entry(stratum).or_insert(0);
        let start = *counter % annotators.len();
        for offset in 0..replication {
            push_row(&mut rows, unit, &annotators[(start + offset) % annotators.len()]);
        }
        *counter += 1;
    }
    rows
}

fn stratum_label(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
