//! # Sentiment Harness Core
//!
//! Runtime-free logic for Sentiment Harness: data models, ingestion and
//! format normalization, aggregation, result export, the store and
//! classifier traits, and the analysis orchestrator.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O. Concrete
//! stores and remote classifiers are provided by the `sentiment-harness`
//! app crate; [`store::memory`] and [`classify::LexiconClassifier`] cover
//! tests and offline use.

pub mod aggregate;
pub mod analysis;
pub mod classify;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod store;
