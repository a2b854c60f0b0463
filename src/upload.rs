//! File management commands: `senti upload`, `senti files`, `senti delete`.

use anyhow::{Context, Result};
use std::path::Path;

use sentiment_harness_core::models::format_ts_iso;

use crate::config::Config;
use crate::service;

/// Upload a local `.txt` or `.csv` file for `user`.
pub async fn run_upload(config: &Config, path: &Path, user: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file path: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let size = bytes.len();

    let analyzer = service::build_analyzer(config).await?;
    let file = analyzer.upload(file_name, bytes, user).await?;

    println!("Uploaded {} ({} bytes)", file.file_name, size);
    println!("id:         {}", file.id);
    println!("object_url: {}", file.object_url);
    Ok(())
}

/// List `user`'s uploaded files, newest first.
pub async fn run_files(config: &Config, user: &str) -> Result<()> {
    let analyzer = service::build_analyzer(config).await?;
    let files = analyzer.list_files(user).await?;

    if files.is_empty() {
        println!("No files.");
        return Ok(());
    }

    for file in &files {
        println!(
            "{}  {}  {}",
            file.id,
            format_ts_iso(&file.created_at),
            file.file_name
        );
    }
    println!();
    println!("{} file(s)", files.len());
    Ok(())
}

pub async fn run_delete(config: &Config, file_id: &str, user: &str) -> Result<()> {
    let analyzer = service::build_analyzer(config).await?;
    analyzer.delete_file(file_id, user).await?;
    println!("Deleted {}", file_id);
    Ok(())
}
