//! Core data models shared by the ingestion, analysis, and export pipeline.
//!
//! These types describe the records that live in the metadata store
//! ([`SourceFile`], [`ResultRecord`]), the values that flow through a single
//! analysis run ([`AnalysisUnit`], [`Prediction`], [`Summary`]), and the
//! row-level output entries ([`RowEntry`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An uploaded input file, as recorded in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFile {
    /// Store-assigned identifier. `None` until the record has been inserted.
    #[serde(skip)]
    pub store_id: Option<i64>,
    /// Externally supplied UUID.
    pub id: String,
    /// Owner identity (already authenticated by the caller's auth layer).
    pub owner: String,
    /// Display name, including the extension used for format detection.
    pub file_name: String,
    /// Object-store name of the uploaded bytes.
    pub object_name: String,
    /// Durable URL returned by the object store.
    pub object_url: String,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

/// Which of the two analysis pipelines produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    #[serde(rename = "per-unit")]
    PerUnit,
    #[serde(rename = "whole-document")]
    WholeDocument,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::PerUnit => "per-unit",
            AnalysisMode::WholeDocument => "whole-document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-unit" | "per_unit" | "linebyline" => Some(AnalysisMode::PerUnit),
            "whole-document" | "whole_document" | "summary" => Some(AnalysisMode::WholeDocument),
            _ => None,
        }
    }
}

/// Position and row context of one [`AnalysisUnit`].
#[derive(Debug, Clone, PartialEq)]
pub enum UnitContext {
    /// 1-based position in the original line sequence (blank lines counted).
    Line { index: usize },
    /// 1-based data-row position (skipped rows counted), the original row,
    /// and the column the text was taken from.
    Row {
        index: usize,
        row: Map<String, Value>,
        text_column: String,
    },
}

/// One classifiable text fragment extracted from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisUnit {
    pub text: String,
    pub context: UnitContext,
}

impl AnalysisUnit {
    pub fn index(&self) -> usize {
        match &self.context {
            UnitContext::Line { index } | UnitContext::Row { index, .. } => *index,
        }
    }
}

/// Output of the classification capability for a single text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

/// Majority verdict over a batch of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Positive,
    Negative,
    Mixed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Positive => "POSITIVE",
            Verdict::Negative => "NEGATIVE",
            Verdict::Mixed => "MIXED",
        }
    }
}

/// Aggregate counts for a per-unit analysis.
///
/// `positive + negative + neutral == total`; `overall` is `None` exactly
/// when `total == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub overall: Option<Verdict>,
}

/// One row of per-unit output. Field order is the serialization order and
/// therefore the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowEntry {
    Line {
        index: usize,
        text: String,
        label: String,
        score: f64,
    },
    Table {
        index: usize,
        text: String,
        text_column: String,
        row: Map<String, Value>,
        label: String,
        score: f64,
    },
}

impl RowEntry {
    /// Attach a prediction to the unit it was produced for.
    pub fn from_unit(unit: AnalysisUnit, prediction: Prediction) -> Self {
        let Prediction { label, score } = prediction;
        match unit.context {
            UnitContext::Line { index } => RowEntry::Line {
                index,
                text: unit.text,
                label,
                score,
            },
            UnitContext::Row {
                index,
                row,
                text_column,
            } => RowEntry::Table {
                index,
                text: unit.text,
                text_column,
                row,
                label,
                score,
            },
        }
    }

    /// Convert into the generic mapping stored in result records.
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Durable outcome of one analysis run, as held by the metadata store.
///
/// `store_id` is the metadata store's own identifier and is never
/// serialized; everything else is part of the exported record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(skip)]
    pub store_id: Option<i64>,
    pub id: String,
    pub owner: String,
    pub file_id: String,
    pub file_name: String,
    pub analysis_type: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_result: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Map<String, Value>>>,
    pub artifact_name: String,
    pub result_url: String,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

/// List view of a [`ResultRecord`], without row-level entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub analysis_type: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_result: Option<Prediction>,
    pub result_url: String,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

impl From<&ResultRecord> for ResultSummary {
    fn from(r: &ResultRecord) -> Self {
        Self {
            id: r.id.clone(),
            file_id: r.file_id.clone(),
            file_name: r.file_name.clone(),
            analysis_type: r.analysis_type,
            summary: r.summary.clone(),
            overall_result: r.overall_result.clone(),
            result_url: r.result_url.clone(),
            created_at: r.created_at,
        }
    }
}

/// Current time truncated to millisecond precision, so that values survive
/// a round trip through the stores and the ISO-8601 rendering unchanged.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Render a timestamp as ISO-8601 UTC with millisecond precision.
pub fn format_ts_iso(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Serde adapter rendering timestamps with [`format_ts_iso`].
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ts_iso(ts))
    }
}
