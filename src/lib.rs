//! # Sentiment Harness
//!
//! Batch sentiment analysis over uploaded text and CSV files, with durable
//! result artifacts and export back to JSON or CSV.
//!
//! The analysis pipeline itself lives in the `sentiment-harness-core` crate.
//! This crate provides the production collaborators and the surfaces around
//! it: SQLite metadata, filesystem and S3 object storage, a remote HTTP
//! classifier, the `senti` CLI, and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│         Analyzer         │──▶│  Classifier  │
//! │  (senti) │   │ ingest → classify →      │   │ lexicon/http │
//! ├──────────┤   │ summarize → persist      │   └──────────────┘
//! │   HTTP   │──▶│                          │
//! └──────────┘   └──────┬──────────────┬────┘
//!                       ▼              ▼
//!                ┌────────────┐  ┌───────────┐
//!                │ ObjectStore│  │  SQLite   │
//!                │  FS / S3   │  │ metadata  │
//!                └────────────┘  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! senti init
//! senti upload reviews.csv --user ann@example.com
//! senti analyze <file-id> --user ann@example.com --mode per-unit
//! senti download <result-id> --user ann@example.com --format csv
//! senti serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite metadata store |
//! | [`object_fs`] | Local-directory object store |
//! | [`object_s3`] | S3 object store |
//! | [`classifier`] | Classifier providers |
//! | [`service`] | Analyzer wiring |
//! | [`server`] | HTTP API |
//! | [`logging`] | tracing setup |

pub mod analyze;
pub mod classifier;
pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod object_fs;
pub mod object_s3;
pub mod results;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod upload;
