use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{DerivedUnit, InputDocument, UnitizationMode};
use crate::seeded::stable_hash;

const SEGMENTATION_ALGO: &str = "rulebased_v1";

/// Maximal runs of non-terminal characters, optionally closed by one
/// terminal punctuation mark.
const SENTENCE_PATTERN: &str = r"[^.!?\n]+[.!?]?";

/// Stamps the algorithm+mode combination so downstream consumers can detect
/// a changed segmentation when re-running.
pub fn segmentation_version(mode: UnitizationMode) -> String {
    let fingerprint = format!("{}:{SEGMENTATION_ALGO}", mode.as_str());
    format!("{SEGMENTATION_ALGO}_{}", stable_hash(&fingerprint))
}

/// Derives the ordered, addressable units for every document. Pure and
/// deterministic: identical inputs always produce identical output.
pub fn derive_units(documents: &[InputDocument], mode: UnitizationMode) -> Result<Vec<DerivedUnit>> {
    let version = segmentation_version(mode);

    match mode {
        UnitizationMode::Document => Ok(documents
            .iter()
            .map(|document| full_document_unit(document, mode, &version))
            .collect()),
        UnitizationMode::SentenceStep => {
            let pattern = Regex::new(SENTENCE_PATTERN)
                .map_err(|err| Error::Unitization(format!("failed to compile sentence pattern: {err}")))?;
            Ok(documents
                .iter()
                .flat_map(|document| split_sentences(document, &pattern, &version))
                .collect())
        }
        UnitizationMode::TargetSpan => {
            let mut units = Vec::new();
            for document in documents {
                units.extend(slice_target_spans(document, &version)?);
            }
            Ok(units)
        }
    }
}

fn make_unit(
    document: &InputDocument,
    mode: UnitizationMode,
    index: usize,
    char_start: usize,
    char_end: usize,
    unit_text: String,
    version: &str,
) -> DerivedUnit {
    DerivedUnit {
        doc_id: document.doc_id.clone(),
        unit_id: format!("{}:u{index}", document.doc_id),
        unit_type: mode,
        index,
        char_start,
        char_end,
        unit_text,
        segmentation_version: version.to_string(),
        pair_id: document.pair_id.clone(),
        meta: document.meta.clone(),
    }
}

fn full_document_unit(
    document: &InputDocument,
    mode: UnitizationMode,
    version: &str,
) -> DerivedUnit {
    make_unit(
        document,
        mode,
        0,
        0,
        document.text.len(),
        document.text.clone(),
        version,
    )
}

fn split_sentences(document: &InputDocument, pattern: &Regex, version: &str) -> Vec<DerivedUnit> {
    let mut units = Vec::new();

    for found in pattern.find_iter(&document.text) {
        let raw = found.as_str();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Offsets point at the trimmed substring within the source text,
        // not at the raw match.
        let leading = raw.len() - raw.trim_start().len();
        let char_start = found.start() + leading;
        let char_end = char_start + trimmed.len();

        let index = units.len();
        units.push(make_unit(
            document,
            UnitizationMode::SentenceStep,
            index,
            char_start,
            char_end,
            trimmed.to_string(),
            version,
        ));
    }

    if units.is_empty() {
        units.push(full_document_unit(
            document,
            UnitizationMode::SentenceStep,
            version,
        ));
    }

    units
}

fn slice_target_spans(document: &InputDocument, version: &str) -> Result<Vec<DerivedUnit>> {
    if document.target_spans.is_empty() {
        return Err(Error::Unitization(format!(
            "document {} has no target_spans for target_span mode",
            document.doc_id
        )));
    }

    let mut spans = document.target_spans.clone();
    spans.sort_by_key(|span| (span.char_start, span.char_end));

    let mut units = Vec::with_capacity(spans.len());
    let mut previous_end = 0_usize;

    for (index, span) in spans.iter().enumerate() {
        if span.char_start >= span.char_end {
            return Err(Error::Unitization(format!(
                "document {}: target span {}..{} is empty",
                document.doc_id, span.char_start, span.char_end
            )));
        }
        if span.char_end > document.text.len() {
            return Err(Error::Unitization(format!(
                "document {}: target span {}..{} exceeds text length {}",
                document.doc_id,
                span.char_start,
                span.char_end,
                document.text.len()
            )));
        }
        if index > 0 && span.char_start < previous_end {
            return Err(Error::Unitization(format!(
                "document {}: target span {}..{} overlaps the previous span ending at {}",
                document.doc_id, span.char_start, span.char_end, previous_end
            )));
        }

        let unit_text = document
            .text
            .get(span.char_start..span.char_end)
            .ok_or_else(|| {
                Error::Unitization(format!(
                    "document {}: target span {}..{} is not aligned to character boundaries",
                    document.doc_id, span.char_start, span.char_end
                ))
            })?;

        units.push(make_unit(
            document,
            UnitizationMode::TargetSpan,
            index,
            span.char_start,
            span.char_end,
            unit_text.to_string(),
            version,
        ));
        previous_end = span.char_end;
    }

    Ok(units)
}
