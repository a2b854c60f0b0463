//! `senti analyze`: run an analysis and print the response as JSON.

use anyhow::{bail, Result};

use sentiment_harness_core::models::AnalysisMode;

use crate::config::Config;
use crate::service;

pub async fn run_analyze(config: &Config, file_id: &str, user: &str, mode: &str) -> Result<()> {
    let Some(mode) = AnalysisMode::parse(mode) else {
        bail!("invalid mode '{}'; use per-unit or whole-document", mode);
    };

    let analyzer = service::build_analyzer(config).await?;
    let json = match mode {
        AnalysisMode::PerUnit => {
            serde_json::to_string_pretty(&analyzer.run_per_unit_analysis(file_id, user).await?)?
        }
        AnalysisMode::WholeDocument => serde_json::to_string_pretty(
            &analyzer.run_whole_document_analysis(file_id, user).await?,
        )?,
    };

    println!("{}", json);
    Ok(())
}
