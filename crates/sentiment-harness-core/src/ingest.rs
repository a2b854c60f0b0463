//! Ingestion and format normalization.
//!
//! Turns the raw bytes of an uploaded file into an ordered list of
//! [`AnalysisUnit`]s, or into a single combined text for whole-document
//! analysis.
//!
//! # Format detection
//!
//! The format is chosen by file name alone: a case-insensitive `.csv`
//! suffix selects [`SourceFormat::Table`], anything else is treated as
//! line-delimited text ([`SourceFormat::Lines`]).
//!
//! # Decoding
//!
//! Bytes are decoded as UTF-8. Invalid byte sequences are dropped rather
//! than replaced, and a leading byte-order mark is removed.
//!
//! # Line-delimited text
//!
//! 1. Split on line breaks: `\r\n`, `\n`, or a lone `\r`.
//! 2. Drop lines that are empty after trimming.
//! 3. Each surviving line becomes a unit whose index is its 1-based
//!    position in the original sequence, so blank lines still count.
//!
//! # Tabular (CSV)
//!
//! The first record is the header. For each data row the text column is
//! `text` when the header has one, otherwise the first column whose value
//! is non-blank text. Purely numeric values (ids, counts, ratings) are not
//! text, so a row whose only populated columns are numeric yields no unit,
//! and a file made only of such rows yields none at all. Rows without usable text are skipped, but still count towards the
//! 1-based row index of later rows.
//!
//! ```rust
//! use sentiment_harness_core::ingest::extract_units;
//!
//! let units = extract_units("notes.txt", b"good\n\n  \nbad").unwrap();
//! let indices: Vec<usize> = units.iter().map(|u| u.index()).collect();
//! assert_eq!(indices, vec![1, 4]);
//! ```

use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::models::{AnalysisUnit, UnitContext};

/// Column name that always wins text-column detection when present.
pub const TEXT_COLUMN: &str = "text";

/// Input layout of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Lines,
    Table,
}

impl SourceFormat {
    pub fn detect(file_name: &str) -> Self {
        let is_csv = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            SourceFormat::Table
        } else {
            SourceFormat::Lines
        }
    }
}

/// Decode bytes as UTF-8, dropping undecodable sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    match out.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => out,
    }
}

/// Extract the ordered analysis units of a file.
///
/// An empty result is not an error here; the per-unit pipeline decides
/// how to report it.
pub fn extract_units(file_name: &str, bytes: &[u8]) -> Result<Vec<AnalysisUnit>, AnalysisError> {
    let text = decode_text(bytes);
    match SourceFormat::detect(file_name) {
        SourceFormat::Lines => Ok(line_units(&text)),
        SourceFormat::Table => table_units(&text),
    }
}

/// Build the combined text used by whole-document analysis.
///
/// Tabular files join the texts of their surviving rows with newlines;
/// line-delimited files use the decoded content as is. The caller checks
/// for blank results.
pub fn whole_text(file_name: &str, bytes: &[u8]) -> Result<String, AnalysisError> {
    let text = decode_text(bytes);
    match SourceFormat::detect(file_name) {
        SourceFormat::Lines => Ok(text),
        SourceFormat::Table => {
            let texts: Vec<String> = table_units(&text)?.into_iter().map(|u| u.text).collect();
            Ok(texts.join("\n"))
        }
    }
}

fn line_units(text: &str) -> Vec<AnalysisUnit> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.split('\n')
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            Some(AnalysisUnit {
                text: line.to_string(),
                context: UnitContext::Line { index: i + 1 },
            })
        })
        .collect()
}

fn table_units(text: &str) -> Result<Vec<AnalysisUnit>, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AnalysisError::bad_input(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    let has_text_column = headers.iter().any(|h| h == TEXT_COLUMN);

    let mut units = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AnalysisError::bad_input(format!("invalid CSV row {}: {}", i + 1, e)))?;

        let mut row = Map::new();
        for (pos, name) in headers.iter().enumerate() {
            let value = record
                .get(pos)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            row.insert(name.clone(), value);
        }

        let Some((text_column, text)) = pick_text(&row, has_text_column) else {
            continue;
        };
        units.push(AnalysisUnit {
            text,
            context: UnitContext::Row {
                index: i + 1,
                row,
                text_column,
            },
        });
    }

    Ok(units)
}

/// Choose the text-bearing column of a row and return it with its trimmed
/// value, or `None` when the row has no usable text.
fn pick_text(row: &Map<String, Value>, has_text_column: bool) -> Option<(String, String)> {
    let non_blank = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    if has_text_column {
        let text = row.get(TEXT_COLUMN).and_then(non_blank)?;
        return Some((TEXT_COLUMN.to_string(), text));
    }

    row.iter().find_map(|(name, value)| {
        non_blank(value)
            .filter(|text| !is_numeric(text))
            .map(|text| (name.clone(), text))
    })
}

fn is_numeric(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | '%'))
}
