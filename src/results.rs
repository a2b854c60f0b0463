//! Result commands: `senti results` and `senti download`.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use sentiment_harness_core::models::format_ts_iso;

use crate::config::Config;
use crate::service;

/// List `user`'s results, newest first.
pub async fn run_results(config: &Config, user: &str) -> Result<()> {
    let analyzer = service::build_analyzer(config).await?;
    let results = analyzer.list_results(user).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for r in &results {
        let verdict = match (&r.summary, &r.overall_result) {
            (Some(summary), _) => format!(
                "{} of {} positive, {} negative ({})",
                summary.positive,
                summary.total,
                summary.negative,
                summary
                    .overall
                    .map(|v| v.as_str())
                    .unwrap_or("NONE")
            ),
            (None, Some(overall)) => format!("{} ({:.3})", overall.label, overall.score),
            (None, None) => String::new(),
        };
        println!(
            "{}  {}  {:<14}  {}  {}",
            r.id,
            format_ts_iso(&r.created_at),
            r.analysis_type.as_str(),
            r.file_name,
            verdict
        );
    }
    println!();
    println!("{} result(s)", results.len());
    Ok(())
}

/// Render a result and write it to `output`, or to stdout when no path is
/// given.
pub async fn run_download(
    config: &Config,
    result_id: &str,
    user: &str,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let analyzer = service::build_analyzer(config).await?;
    let export = analyzer.download_result(result_id, format, user).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &export.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} ({} bytes, {})",
                path.display(),
                export.bytes.len(),
                export.content_type
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&export.bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
