//! SQLite-backed metadata store.
//!
//! Implements [`MetadataStore`] over the `files` and `results` tables
//! created by [`crate::migrate`]. The store's own identifier is the
//! `store_id` rowid; the external UUID lives in the unique `id` column.
//! Lookups match either.
//!
//! Timestamps are stored as Unix milliseconds. Summary, overall result, and
//! row entries are stored as JSON text.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use sentiment_harness_core::models::{AnalysisMode, ResultRecord, SourceFile};
use sentiment_harness_core::store::MetadataStore;

const FILE_COLUMNS: &str = "store_id, id, owner, file_name, object_name, object_url, created_at";
const RESULT_COLUMNS: &str = "store_id, id, owner, file_id, file_name, analysis_type, summary_json, overall_json, rows_json, artifact_name, result_url, created_at";

pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn native_id(lookup: &str) -> Option<i64> {
    lookup.trim().parse().ok()
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("invalid timestamp: {}", ms))
}

fn file_from_row(row: &SqliteRow) -> Result<SourceFile> {
    Ok(SourceFile {
        store_id: Some(row.try_get("store_id")?),
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        file_name: row.try_get("file_name")?,
        object_name: row.try_get("object_name")?,
        object_url: row.try_get("object_url")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<Option<T>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .with_context(|| format!("Invalid JSON in results.{}", column))
}

fn result_from_row(row: &SqliteRow) -> Result<ResultRecord> {
    let analysis_type: String = row.try_get("analysis_type")?;
    Ok(ResultRecord {
        store_id: Some(row.try_get("store_id")?),
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        file_id: row.try_get("file_id")?,
        file_name: row.try_get("file_name")?,
        analysis_type: AnalysisMode::parse(&analysis_type)
            .ok_or_else(|| anyhow!("unknown analysis type: {}", analysis_type))?,
        summary: json_column(row, "summary_json")?,
        overall_result: json_column(row, "overall_json")?,
        rows: json_column(row, "rows_json")?,
        artifact_name: row.try_get("artifact_name")?,
        result_url: row.try_get("result_url")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_file(&self, file: &SourceFile) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO files (id, owner, file_name, object_name, object_url, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.owner)
        .bind(&file.file_name)
        .bind(&file.object_name)
        .bind(&file.object_url)
        .bind(file.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to insert file record")?;

        Ok(result.last_insert_rowid())
    }

    async fn find_file(&self, id: &str) -> Result<Option<SourceFile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM files WHERE id = ? OR store_id = ? LIMIT 1",
            FILE_COLUMNS
        ))
        .bind(id.trim())
        .bind(native_id(id))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    async fn list_files(&self, owner: &str) -> Result<Vec<SourceFile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM files WHERE owner = ? ORDER BY created_at DESC, store_id DESC",
            FILE_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(file_from_row).collect()
    }

    async fn delete_file(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ? OR store_id = ?")
            .bind(id.trim())
            .bind(native_id(id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_result(&self, record: &ResultRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO results (id, owner, file_id, file_name, analysis_type, summary_json,
                                 overall_json, rows_json, artifact_name, result_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner)
        .bind(&record.file_id)
        .bind(&record.file_name)
        .bind(record.analysis_type.as_str())
        .bind(to_json(&record.summary)?)
        .bind(to_json(&record.overall_result)?)
        .bind(to_json(&record.rows)?)
        .bind(&record.artifact_name)
        .bind(&record.result_url)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to insert result record")?;

        Ok(result.last_insert_rowid())
    }

    async fn find_result(&self, id: &str) -> Result<Option<ResultRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM results WHERE id = ? OR store_id = ? LIMIT 1",
            RESULT_COLUMNS
        ))
        .bind(id.trim())
        .bind(native_id(id))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(result_from_row).transpose()
    }

    async fn list_results(&self, owner: &str) -> Result<Vec<ResultRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM results WHERE owner = ? ORDER BY created_at DESC, store_id DESC",
            RESULT_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(result_from_row).collect()
    }
}
