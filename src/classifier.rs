//! Classifier backends and provider selection.
//!
//! Two providers are available:
//! - **`lexicon`**: the rule-based [`LexiconClassifier`] from the core crate.
//!   No network calls.
//! - **`http`**: [`HttpClassifier`], which calls a remote text-classification
//!   endpoint (Hugging Face Inference API or a compatible server) with
//!   batching, retry, and backoff.
//!
//! Use [`create_classifier`] to build the configured provider.
//!
//! # Wire format
//!
//! Requests are `POST <url>` with body `{"inputs": [...texts], "model": ...}`
//! (`model` omitted when unset). The response must be a JSON array with one
//! element per input, either a `{label, score}` object or an array of such
//! objects (top-k output), in which case the highest score wins.
//!
//! If `SENTI_CLASSIFIER_TOKEN` is set it is sent as a bearer token.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use sentiment_harness_core::classify::{Classifier, LexiconClassifier};
use sentiment_harness_core::models::Prediction;

use crate::config::ClassifierConfig;

/// Environment variable holding the optional bearer token.
pub const TOKEN_ENV: &str = "SENTI_CLASSIFIER_TOKEN";

/// Build the classifier selected by `config.provider`.
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    match config.provider.as_str() {
        "lexicon" => Ok(Arc::new(LexiconClassifier::new())),
        "http" => Ok(Arc::new(HttpClassifier::new(config)?)),
        other => bail!("Unknown classifier provider: {}", other),
    }
}

/// Remote text-classification endpoint.
pub struct HttpClassifier {
    url: String,
    model: Option<String>,
    token: Option<String>,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow!("classifier.url required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url,
            model: config.model.clone(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        let mut body = serde_json::json!({ "inputs": texts });
        if let Some(ref model) = self.model {
            body["model"] = Value::String(model.clone());
        }

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, delay_secs = delay.as_secs(), "retrying classifier request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .json(&body);
            if let Some(ref token) = self.token {
                req = req.header("Authorization", format!("Bearer {}", token));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return parse_response(&json, texts.len());
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("classifier error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429): fail fast
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("classifier error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("classification failed after retries")))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(batch = batch.len(), "classifying batch");
            out.extend(self.classify_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Parse a classification response with one element per input.
fn parse_response(json: &Value, expected: usize) -> Result<Vec<Prediction>> {
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("Invalid classifier response: expected an array"))?;
    if items.len() != expected {
        bail!(
            "Invalid classifier response: {} results for {} inputs",
            items.len(),
            expected
        );
    }

    items
        .iter()
        .map(|item| match item {
            Value::Array(candidates) => candidates
                .iter()
                .map(parse_prediction)
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .ok_or_else(|| anyhow!("Invalid classifier response: empty candidate list")),
            other => parse_prediction(other),
        })
        .collect()
}

fn parse_prediction(value: &Value) -> Result<Prediction> {
    let label = value
        .get("label")
        .and_then(|l| l.as_str())
        .ok_or_else(|| anyhow!("Invalid classifier response: missing label"))?;
    let score = value
        .get("score")
        .and_then(|s| s.as_f64())
        .ok_or_else(|| anyhow!("Invalid classifier response: missing score"))?;
    if !(0.0..=1.0).contains(&score) {
        bail!("Invalid classifier response: score {} outside [0, 1]", score);
    }
    Ok(Prediction {
        label: label.to_string(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_response() {
        let json = json!([
            {"label": "Positive", "score": 0.91},
            {"label": "Negative", "score": 0.7}
        ]);
        let preds = parse_response(&json, 2).unwrap();
        assert_eq!(preds[0].label, "Positive");
        assert_eq!(preds[1].score, 0.7);
    }

    #[test]
    fn test_parse_top_k_response_picks_best() {
        let json = json!([[
            {"label": "neutral", "score": 0.2},
            {"label": "positive", "score": 0.75},
            {"label": "negative", "score": 0.05}
        ]]);
        let preds = parse_response(&json, 1).unwrap();
        assert_eq!(preds[0].label, "positive");
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let json = json!([{"label": "POS", "score": 1.0}]);
        let err = parse_response(&json, 2).unwrap_err();
        assert!(err.to_string().contains("1 results for 2 inputs"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_response(&json!({"error": "x"}), 1).is_err());
        assert!(parse_response(&json!([{"label": "POS"}]), 1).is_err());
        assert!(parse_response(&json!([[]]), 1).is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_score() {
        let err = parse_response(&json!([{"label": "POS", "score": 1.2}]), 1).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
        assert!(parse_response(&json!([{"label": "NEG", "score": -0.1}]), 1).is_err());
        assert!(parse_response(&json!([[{"label": "POS", "score": 7.0}]]), 1).is_err());
        assert!(parse_response(&json!([{"label": "POS", "score": 1.0}]), 1).is_ok());
    }

    #[test]
    fn test_create_classifier_by_provider() {
        let lexicon = create_classifier(&ClassifierConfig::default()).unwrap();
        assert_eq!(lexicon.name(), "lexicon");

        let http = create_classifier(&ClassifierConfig {
            provider: "http".to_string(),
            url: Some("http://127.0.0.1:9/classify".to_string()),
            ..ClassifierConfig::default()
        })
        .unwrap();
        assert_eq!(http.name(), "http");

        assert!(create_classifier(&ClassifierConfig {
            provider: "http".to_string(),
            ..ClassifierConfig::default()
        })
        .is_err());
    }
}
