//! Wiring of the configured stores and classifier into an [`Analyzer`].

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::debug;

use sentiment_harness_core::aggregate::PolarityMarkers;
use sentiment_harness_core::analysis::Analyzer;
use sentiment_harness_core::store::ObjectStore;

use crate::classifier::create_classifier;
use crate::config::{Config, StorageConfig};
use crate::db;
use crate::migrate;
use crate::object_fs::FsObjectStore;
use crate::object_s3::S3ObjectStore;
use crate::sqlite_store::SqliteMetadataStore;

/// Build the object store selected by `[storage].backend`.
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        "filesystem" => Ok(Arc::new(FsObjectStore::new(&config.root)?)),
        "s3" => {
            let s3 = config
                .s3
                .clone()
                .context("storage.s3 must be configured when backend is 's3'")?;
            Ok(Arc::new(S3ObjectStore::from_env(s3)?))
        }
        other => bail!("Unknown storage backend: {}", other),
    }
}

/// Open the database (creating the schema if needed) and assemble the
/// analyzer from the configured collaborators.
pub async fn build_analyzer(config: &Config) -> Result<Analyzer> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let objects = create_object_store(&config.storage)?;
    let classifier = create_classifier(&config.classifier)?;
    let markers = PolarityMarkers::new(
        &config.classifier.positive_marker,
        &config.classifier.negative_marker,
    );
    debug!(
        storage = %config.storage.backend,
        classifier = classifier.name(),
        "analyzer ready"
    );

    Ok(Analyzer::new(
        objects,
        Arc::new(SqliteMetadataStore::new(pool)),
        classifier,
        markers,
    ))
}
