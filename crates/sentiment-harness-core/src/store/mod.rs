//! Storage abstractions for Sentiment Harness.
//!
//! Two independent stores back the pipeline:
//!
//! - [`ObjectStore`]: named binary blobs (uploaded sources and result
//!   artifacts). Returns a durable URL on write.
//! - [`MetadataStore`]: queryable records for uploaded files and analysis
//!   results.
//!
//! Neither store participates in a transaction with the other. Writers keep
//! them consistent by ordering: blob first, metadata second.
//!
//! Implementations must be `Send + Sync` to work with async runtimes. The
//! in-memory implementations in [`memory`] back the tests; the application
//! crate provides filesystem, S3, and SQLite implementations.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ResultRecord, SourceFile};

/// Location of a blob written to an [`ObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub url: String,
}

/// Returned (inside `anyhow::Error`) by [`ObjectStore::get`] when the
/// object does not exist.
#[derive(Debug, Error)]
#[error("object not found: {0}")]
pub struct ObjectNotFound(pub String);

/// Blob storage addressed by name.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](ObjectStore::put) | Write bytes under a name, returning its durable URL |
/// | [`get`](ObjectStore::get) | Read bytes back; fails with [`ObjectNotFound`] if absent |
/// | [`delete`](ObjectStore::delete) | Remove a blob; deleting a missing blob is not an error |
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<StoredObject>;

    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Record storage for uploaded files and analysis results.
///
/// Every record has two identifiers: the store's own (`store_id`, assigned
/// on insert) and an externally supplied UUID (`id`). Lookups by id accept
/// either form, whichever matches.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a file record and return its store-assigned id.
    async fn insert_file(&self, file: &SourceFile) -> Result<i64>;

    async fn find_file(&self, id: &str) -> Result<Option<SourceFile>>;

    /// All files owned by `owner`, newest first.
    async fn list_files(&self, owner: &str) -> Result<Vec<SourceFile>>;

    /// Returns `true` if a record was deleted.
    async fn delete_file(&self, id: &str) -> Result<bool>;

    /// Insert a result record and return its store-assigned id.
    async fn insert_result(&self, record: &ResultRecord) -> Result<i64>;

    async fn find_result(&self, id: &str) -> Result<Option<ResultRecord>>;

    /// All results owned by `owner`, newest first.
    async fn list_results(&self, owner: &str) -> Result<Vec<ResultRecord>>;
}

/// Whether a lookup id refers to a record with the given identifiers.
pub fn id_matches(lookup: &str, store_id: Option<i64>, external_id: &str) -> bool {
    let lookup = lookup.trim();
    lookup == external_id
        || matches!((store_id, lookup.parse::<i64>()), (Some(a), Ok(b)) if a == b)
}
