//! Rendering of persisted result records for download.
//!
//! Two encodings are supported:
//!
//! | Format | Content type | Body |
//! |--------|--------------|------|
//! | `json` | `application/json` | The whole record (without the store's own id), 4-space indented |
//! | `csv` | `text/csv` | One line per row entry, columns taken from the first entry |
//!
//! The format name is matched case-insensitively. CSV export needs row
//! entries, so whole-document results can only be exported as JSON.
//!
//! # CSV cells
//!
//! Strings are written verbatim, numbers and booleans in their JSON form,
//! `null` as an empty cell, and nested objects or arrays as compact JSON.
//! An entry missing one of the header keys gets an empty cell; an entry
//! carrying a key the first entry lacks is rejected, since the header
//! cannot describe it.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::models::ResultRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self, AnalysisError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AnalysisError::bad_input(format!(
                "invalid format '{}'; use csv or json",
                other
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// A rendered download.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

/// Render `record` in the requested format.
pub fn render(record: &ResultRecord, format: ExportFormat) -> Result<Export, AnalysisError> {
    let bytes = match format {
        ExportFormat::Json => to_pretty_json(record)
            .map_err(|e| AnalysisError::upstream("serialize result record", e.into()))?,
        ExportFormat::Csv => {
            let rows = record
                .rows
                .as_deref()
                .ok_or_else(|| AnalysisError::bad_input("no rows available for CSV export"))?;
            rows_to_csv(rows)?
        }
    };

    Ok(Export {
        bytes,
        content_type: format.content_type(),
        file_name: format!("analysis_{}.{}", record.id, format.extension()),
    })
}

/// Serialize with 4-space indentation. Shared with the artifact encoder so
/// that artifacts and JSON downloads have the same layout.
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

fn rows_to_csv(rows: &[Map<String, Value>]) -> Result<Vec<u8>, AnalysisError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = first.keys().map(String::as_str).collect();
    writer.write_record(&header).map_err(csv_failure)?;

    for (i, row) in rows.iter().enumerate() {
        if let Some(extra) = row.keys().find(|k| !first.contains_key(k.as_str())) {
            return Err(AnalysisError::bad_input(format!(
                "row {} has field '{}' not present in the first row",
                i + 1,
                extra
            )));
        }
        let cells: Vec<String> = header
            .iter()
            .map(|k| row.get(*k).map(cell).unwrap_or_default())
            .collect();
        writer.write_record(&cells).map_err(csv_failure)?;
    }

    writer
        .into_inner()
        .map_err(|e| AnalysisError::upstream("flush CSV export", anyhow::anyhow!("{}", e)))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn csv_failure(e: csv::Error) -> AnalysisError {
    AnalysisError::upstream("write CSV export", e.into())
}
