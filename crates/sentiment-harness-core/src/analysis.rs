//! Analysis orchestration.
//!
//! [`Analyzer`] ties the stores, the classifier, and the pure pipeline
//! stages together. Every caller-facing operation takes the caller's
//! identity and only ever touches records that identity owns; a record that
//! exists but belongs to someone else is reported exactly like a missing one.
//!
//! # Write ordering
//!
//! Both analysis modes write the artifact blob first and the result record
//! second. A failure between the two leaves an unreferenced artifact under a
//! fresh name, never a record pointing at nothing. Nothing is written when
//! fetching, normalization, or classification fails. Uploads follow the same
//! blob-then-record order.
//!
//! # Per-unit pipeline
//!
//! ```text
//! resolve file ─▶ get bytes ─▶ extract_units ─▶ classify (one batch call)
//!      ─▶ summarize ─▶ put artifact ─▶ insert record ─▶ PerUnitResponse
//! ```
//!
//! # Whole-document pipeline
//!
//! ```text
//! resolve file ─▶ get bytes ─▶ whole_text ─▶ classify_one
//!      ─▶ put artifact ─▶ insert record ─▶ WholeDocumentResponse
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{summarize, PolarityMarkers};
use crate::classify::Classifier;
use crate::error::{AnalysisError, UpstreamExt};
use crate::export::{self, Export, ExportFormat};
use crate::ingest;
use crate::models::{
    iso8601, now_millis, AnalysisMode, Prediction, ResultRecord, ResultSummary, RowEntry,
    SourceFile, Summary,
};
use crate::store::{MetadataStore, ObjectStore};

/// File extensions accepted by [`Analyzer::upload`].
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "csv"];

/// Response of a per-unit analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerUnitResponse {
    pub result_id: String,
    pub result_url: String,
    pub summary: Summary,
    pub rows: Vec<Map<String, Value>>,
}

/// Response of a whole-document analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WholeDocumentResponse {
    pub result_id: String,
    pub result_url: String,
    pub overall_result: Prediction,
}

#[derive(Serialize)]
struct PerUnitArtifact<'a> {
    file_id: &'a str,
    file_name: &'a str,
    analysis_type: AnalysisMode,
    summary: &'a Summary,
    rows: &'a [Map<String, Value>],
    #[serde(with = "iso8601")]
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WholeDocumentArtifact<'a> {
    file_id: &'a str,
    file_name: &'a str,
    analysis_type: AnalysisMode,
    overall_result: &'a Prediction,
    #[serde(with = "iso8601")]
    created_at: DateTime<Utc>,
}

/// Outcome of one run, before it is persisted.
struct Outcome {
    summary: Option<Summary>,
    overall_result: Option<Prediction>,
    rows: Option<Vec<Map<String, Value>>>,
}

/// The analysis orchestrator.
///
/// Collaborators are injected at construction; the analyzer holds no other
/// state and can be shared freely across tasks.
pub struct Analyzer {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    classifier: Arc<dyn Classifier>,
    markers: PolarityMarkers,
}

impl Analyzer {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        classifier: Arc<dyn Classifier>,
        markers: PolarityMarkers,
    ) -> Self {
        Self {
            objects,
            metadata,
            classifier,
            markers,
        }
    }

    /// Store an uploaded file and record it for `caller`.
    ///
    /// Only `.txt` and `.csv` names are accepted (case-insensitive).
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        caller: &str,
    ) -> Result<SourceFile, AnalysisError> {
        let file_name = file_name.trim();
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AnalysisError::bad_input(format!(
                "unsupported file type '{}'; only .txt and .csv files are accepted",
                file_name
            )));
        }

        let id = Uuid::new_v4().to_string();
        let object_name = format!("{}_{}", id, sanitize_name(file_name));
        let size = bytes.len();
        let stored = self
            .objects
            .put(bytes, &object_name)
            .await
            .upstream(|| format!("store upload {}", object_name))?;
        debug!(object = %stored.name, size, "upload stored");

        let mut file = SourceFile {
            store_id: None,
            id,
            owner: caller.to_string(),
            file_name: file_name.to_string(),
            object_name: stored.name,
            object_url: stored.url,
            created_at: now_millis(),
        };
        let store_id = self
            .metadata
            .insert_file(&file)
            .await
            .upstream(|| "record upload".to_string())?;
        file.store_id = Some(store_id);

        info!(file_id = %file.id, file_name = %file.file_name, size, "file uploaded");
        Ok(file)
    }

    /// The caller's uploaded files, newest first.
    pub async fn list_files(&self, caller: &str) -> Result<Vec<SourceFile>, AnalysisError> {
        self.metadata
            .list_files(caller)
            .await
            .upstream(|| "list files".to_string())
    }

    pub async fn get_file(&self, file_id: &str, caller: &str) -> Result<SourceFile, AnalysisError> {
        self.resolve_file(file_id, caller).await
    }

    /// Delete a file record and, best-effort, its blob.
    pub async fn delete_file(&self, file_id: &str, caller: &str) -> Result<(), AnalysisError> {
        let file = self.resolve_file(file_id, caller).await?;

        if let Err(error) = self.objects.delete(&file.object_name).await {
            warn!(object = %file.object_name, "failed to delete upload blob: {:#}", error);
        }

        self.metadata
            .delete_file(&file.id)
            .await
            .upstream(|| format!("delete file record {}", file.id))?;
        info!(file_id = %file.id, "file deleted");
        Ok(())
    }

    /// Classify every unit of a file and persist the row-level result.
    pub async fn run_per_unit_analysis(
        &self,
        file_id: &str,
        caller: &str,
    ) -> Result<PerUnitResponse, AnalysisError> {
        let file = self.resolve_file(file_id, caller).await?;
        let bytes = self.fetch_source(&file).await?;

        let units = ingest::extract_units(&file.file_name, &bytes)?;
        if units.is_empty() {
            return Err(AnalysisError::bad_input(format!(
                "no analyzable text in '{}'",
                file.file_name
            )));
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let predictions = self
            .classifier
            .classify(&texts)
            .await
            .upstream(|| format!("classifier '{}'", self.classifier.name()))?;
        if predictions.len() != texts.len() {
            return Err(AnalysisError::upstream(
                format!("classifier '{}'", self.classifier.name()),
                anyhow::anyhow!(
                    "returned {} predictions for {} texts",
                    predictions.len(),
                    texts.len()
                ),
            ));
        }

        let summary = summarize(&predictions, &self.markers);
        let rows: Vec<Map<String, Value>> = units
            .into_iter()
            .zip(predictions)
            .map(|(unit, prediction)| RowEntry::from_unit(unit, prediction).into_map())
            .collect();

        let created_at = now_millis();
        let artifact = export::to_pretty_json(&PerUnitArtifact {
            file_id: &file.id,
            file_name: &file.file_name,
            analysis_type: AnalysisMode::PerUnit,
            summary: &summary,
            rows: &rows,
            created_at,
        })
        .map_err(|e| AnalysisError::upstream("serialize artifact", e.into()))?;

        let record = self
            .persist(
                &file,
                AnalysisMode::PerUnit,
                artifact,
                created_at,
                Outcome {
                    summary: Some(summary.clone()),
                    overall_result: None,
                    rows: Some(rows.clone()),
                },
            )
            .await?;

        info!(
            result_id = %record.id,
            file_id = %file.id,
            units = summary.total,
            positive = summary.positive,
            negative = summary.negative,
            "per-unit analysis complete"
        );
        Ok(PerUnitResponse {
            result_id: record.id,
            result_url: record.result_url,
            summary,
            rows,
        })
    }

    /// Classify the combined text of a file once and persist the verdict.
    pub async fn run_whole_document_analysis(
        &self,
        file_id: &str,
        caller: &str,
    ) -> Result<WholeDocumentResponse, AnalysisError> {
        let file = self.resolve_file(file_id, caller).await?;
        let bytes = self.fetch_source(&file).await?;

        let text = ingest::whole_text(&file.file_name, &bytes)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::bad_input("no text to analyze"));
        }

        let overall = self
            .classifier
            .classify_one(text)
            .await
            .upstream(|| format!("classifier '{}'", self.classifier.name()))?;

        let created_at = now_millis();
        let artifact = export::to_pretty_json(&WholeDocumentArtifact {
            file_id: &file.id,
            file_name: &file.file_name,
            analysis_type: AnalysisMode::WholeDocument,
            overall_result: &overall,
            created_at,
        })
        .map_err(|e| AnalysisError::upstream("serialize artifact", e.into()))?;

        let record = self
            .persist(
                &file,
                AnalysisMode::WholeDocument,
                artifact,
                created_at,
                Outcome {
                    summary: None,
                    overall_result: Some(overall.clone()),
                    rows: None,
                },
            )
            .await?;

        info!(
            result_id = %record.id,
            file_id = %file.id,
            chars = text.chars().count(),
            label = %overall.label,
            "whole-document analysis complete"
        );
        Ok(WholeDocumentResponse {
            result_id: record.id,
            result_url: record.result_url,
            overall_result: overall,
        })
    }

    /// The caller's results, newest first, without row entries.
    pub async fn list_results(&self, caller: &str) -> Result<Vec<ResultSummary>, AnalysisError> {
        let records = self
            .metadata
            .list_results(caller)
            .await
            .upstream(|| "list results".to_string())?;
        Ok(records.iter().map(ResultSummary::from).collect())
    }

    /// Render one of the caller's results as `json` or `csv`.
    pub async fn download_result(
        &self,
        result_id: &str,
        format: &str,
        caller: &str,
    ) -> Result<Export, AnalysisError> {
        let format = ExportFormat::parse(format)?;
        let record = self
            .metadata
            .find_result(result_id)
            .await
            .upstream(|| format!("find result {}", result_id))?
            .filter(|r| r.owner == caller)
            .ok_or(AnalysisError::NotFoundOrUnauthorized("result"))?;
        export::render(&record, format)
    }

    async fn resolve_file(&self, file_id: &str, caller: &str) -> Result<SourceFile, AnalysisError> {
        self.metadata
            .find_file(file_id)
            .await
            .upstream(|| format!("find file {}", file_id))?
            .filter(|f| f.owner == caller)
            .ok_or(AnalysisError::NotFoundOrUnauthorized("file"))
    }

    async fn fetch_source(&self, file: &SourceFile) -> Result<Vec<u8>, AnalysisError> {
        let bytes = self
            .objects
            .get(&file.object_name)
            .await
            .upstream(|| format!("fetch source {}", file.object_name))?;
        debug!(object = %file.object_name, size = bytes.len(), "source fetched");
        Ok(bytes)
    }

    async fn persist(
        &self,
        file: &SourceFile,
        mode: AnalysisMode,
        artifact: Vec<u8>,
        created_at: DateTime<Utc>,
        outcome: Outcome,
    ) -> Result<ResultRecord, AnalysisError> {
        let id = Uuid::new_v4().to_string();
        let artifact_name = format!("{}_{}_{}.json", id, sanitize_name(&file.owner), mode.as_str());
        let stored = self
            .objects
            .put(artifact, &artifact_name)
            .await
            .upstream(|| format!("store artifact {}", artifact_name))?;
        debug!(object = %stored.name, "artifact stored");

        let mut record = ResultRecord {
            store_id: None,
            id,
            owner: file.owner.clone(),
            file_id: file.id.clone(),
            file_name: file.file_name.clone(),
            analysis_type: mode,
            summary: outcome.summary,
            overall_result: outcome.overall_result,
            rows: outcome.rows,
            artifact_name: stored.name,
            result_url: stored.url,
            created_at,
        };
        let store_id = self
            .metadata
            .insert_result(&record)
            .await
            .upstream(|| format!("record result {}", record.id))?;
        record.store_id = Some(store_id);
        Ok(record)
    }
}

/// Make a value safe for use inside an object name: anything other than
/// ASCII alphanumerics and `.-_@+` becomes `_`.
pub fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
