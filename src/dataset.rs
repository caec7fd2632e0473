use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{InputDocument, StudySpec};

pub fn read_study_spec(path: &Path) -> anyhow::Result<StudySpec> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let spec: StudySpec = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse study spec {}", path.display()))?;
    Ok(spec)
}

pub fn read_documents(path: &Path) -> anyhow::Result<Vec<InputDocument>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if extension != "jsonl" && extension != "csv" {
        return Err(Error::DatasetValidation(format!(
            "unsupported dataset format for {}: use .csv or .jsonl",
            path.display()
        ))
        .into());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let documents = if extension == "jsonl" {
        parse_jsonl_documents(&raw)?
    } else {
        parse_csv_documents(&raw)?
    };

    Ok(documents)
}

pub fn read_sidecar_rows(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut rows = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: Value = serde_json::from_str(line).map_err(|err| {
            Error::ContextResolution(format!("sidecar line {}: {err}", number + 1))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn parse_jsonl_documents(raw: &str) -> Result<Vec<InputDocument>> {
    let mut documents = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let document: InputDocument = serde_json::from_str(line)
            .map_err(|err| Error::DatasetValidation(format!("line {}: {err}", number + 1)))?;
        documents.push(document);
    }
    Ok(documents)
}

/// RFC-4180-style CSV: `""` escapes a quote inside a quoted field, and
/// commas and newlines inside quotes are literal. The header must carry
/// `doc_id` and `text`; `meta.<key>` columns are lifted into the meta map.
pub fn parse_csv_documents(raw: &str) -> Result<Vec<InputDocument>> {
    let records = parse_csv_records(raw)?;
    let Some((header, data)) = records.split_first() else {
        return Ok(Vec::new());
    };

    let header: Vec<&str> = header.iter().map(|cell| cell.trim()).collect();
    let doc_id_index = header
        .iter()
        .position(|name| *name == "doc_id")
        .ok_or_else(|| Error::DatasetValidation("csv header must include a doc_id column".into()))?;
    let text_index = header
        .iter()
        .position(|name| *name == "text")
        .ok_or_else(|| Error::DatasetValidation("csv header must include a text column".into()))?;
    let meta_columns: Vec<(usize, &str)> = header
        .iter()
        .enumerate()
        .filter_map(|(index, name)| name.strip_prefix("meta.").map(|key| (index, key)))
        .collect();

    let mut documents = Vec::with_capacity(data.len());
    for record in data {
        let cell = |index: usize| record.get(index).map(|value| value.trim()).unwrap_or("");

        let mut meta = serde_json::Map::new();
        for (index, key) in &meta_columns {
            let value = cell(*index);
            if !value.is_empty() {
                meta.insert((*key).to_string(), Value::String(value.to_string()));
            }
        }

        documents.push(InputDocument {
            doc_id: cell(doc_id_index).to_string(),
            text: cell(text_index).to_string(),
            pair_id: None,
            meta,
            target_spans: Vec::new(),
        });
    }

    Ok(documents)
}

fn parse_csv_records(raw: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_record(&mut records, &mut record, &mut field);
            }
            '\n' => end_record(&mut records, &mut record, &mut field),
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(Error::DatasetValidation(
            "csv input ends inside a quoted field".into(),
        ));
    }
    end_record(&mut records, &mut record, &mut field);

    Ok(records)
}

fn end_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    if record.is_empty() && field.is_empty() {
        return;
    }
    record.push(std::mem::take(field));
    records.push(std::mem::take(record));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jsonl_documents_with_meta_and_spans() {
        let raw = concat!(
            r#"{"doc_id":"d1","text":"Alpha. Beta!","meta":{"topic":"math"}}"#,
            "\n",
            r#"{"doc_id":"d2","text":"Gamma","target_spans":[{"char_start":0,"char_end":5}]}"#,
            "\n",
        );

        let documents = parse_jsonl_documents(raw).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].doc_id, "d1");
        assert_eq!(documents[0].meta.get("topic").and_then(|v| v.as_str()), Some("math"));
        assert_eq!(documents[1].target_spans.len(), 1);
        assert_eq!(documents[1].target_spans[0].char_end, 5);
    }

    #[test]
    fn jsonl_parse_errors_name_the_line() {
        let raw = "{\"doc_id\":\"d1\",\"text\":\"ok\"}\nnot json\n";
        let err = parse_jsonl_documents(raw).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn parses_quoted_csv_cells_with_commas_and_escaped_quotes() {
        let raw = "doc_id,text,meta.source,meta.notes\nd1,\"Hello, world.\",paper,\"quote \"\"A\"\"\"\n";

        let documents = parse_csv_documents(raw).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].doc_id, "d1");
        assert_eq!(documents[0].text, "Hello, world.");
        assert_eq!(
            documents[0].meta.get("source").and_then(|v| v.as_str()),
            Some("paper")
        );
        assert_eq!(
            documents[0].meta.get("notes").and_then(|v| v.as_str()),
            Some("quote \"A\"")
        );
    }

    #[test]
    fn quoted_csv_cells_keep_literal_newlines() {
        let raw = "doc_id,text\nd1,\"Line one\nLine two\"\nd2,Plain\n";

        let documents = parse_csv_documents(raw).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text, "Line one\nLine two");
        assert_eq!(documents[1].text, "Plain");
    }

    #[test]
    fn csv_tolerates_crlf_line_endings_and_blank_lines() {
        let raw = "doc_id,text\r\nd1,Alpha\r\n\r\nd2,Beta\r\n";

        let documents = parse_csv_documents(raw).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].doc_id, "d2");
    }

    #[test]
    fn csv_blank_meta_cells_are_omitted() {
        let raw = "doc_id,text,meta.notes\nd1,Alpha,\n";

        let documents = parse_csv_documents(raw).unwrap();
        assert!(documents[0].meta.is_empty());
    }

    #[test]
    fn csv_without_required_columns_is_rejected() {
        let err = parse_csv_documents("id,body\nd1,Alpha\n").unwrap_err();
        assert!(err.to_string().contains("doc_id"));
    }

    #[test]
    fn csv_ending_inside_quotes_is_rejected() {
        let err = parse_csv_documents("doc_id,text\nd1,\"unterminated\n").unwrap_err();
        assert!(err.to_string().contains("quoted field"));
    }

    #[test]
    fn unsupported_dataset_extension_is_rejected() {
        let err = read_documents(Path::new("dataset.txt")).unwrap_err();
        assert!(err.to_string().contains("use .csv or .jsonl"));
    }
}
