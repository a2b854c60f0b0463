//! Classification capability trait and the built-in lexicon classifier.
//!
//! The [`Classifier`] trait is the seam to the sentiment model. A call
//! takes a batch of texts and returns exactly one [`Prediction`] per text,
//! in request order. Implementations own their own timeouts and retries.
//!
//! [`LexiconClassifier`] is a rule-based implementation with small built-in
//! word lists. It needs no network and is deterministic, which makes it the
//! default for offline use and tests. Remote model backends live in the
//! `sentiment-harness` app crate.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::Prediction;

/// Batch sentiment classification.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short backend identifier used in logs (e.g. `"lexicon"`).
    fn name(&self) -> &str;

    /// Classify a batch of texts. The result has the same length and order
    /// as `texts`.
    async fn classify(&self, texts: &[String]) -> Result<Vec<Prediction>>;

    /// Classify a single text.
    async fn classify_one(&self, text: &str) -> Result<Prediction> {
        let mut out = self.classify(&[text.to_string()]).await?;
        if out.len() != 1 {
            bail!(
                "classifier '{}' returned {} predictions for 1 text",
                self.name(),
                out.len()
            );
        }
        Ok(out.remove(0))
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "best", "better", "brilliant", "delight", "delightful", "enjoy",
    "enjoyed", "excellent", "fantastic", "fast", "friendly", "glad", "good", "great", "happy",
    "helpful", "impressive", "like", "liked", "love", "loved", "lovely", "nice", "perfect",
    "pleasant", "recommend", "satisfied", "smooth", "superb", "thanks", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoying", "awful", "bad", "boring", "broken", "bug", "buggy", "crash", "disappointed",
    "disappointing", "hate", "hated", "horrible", "poor", "problem", "refund", "rude", "sad",
    "slow", "terrible", "ugly", "unhappy", "useless", "waste", "worse", "worst", "wrong",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "didn't", "isn't", "wasn't", "can't"];

/// Rule-based classifier over fixed word lists.
///
/// Each token found in a list counts one vote for that polarity; a negation
/// directly before a token flips its vote. Labels are `POSITIVE`,
/// `NEGATIVE`, or `NEUTRAL`. The score grows with the margin between the two
/// vote counts and is `0.5` when there is none.
#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one text synchronously.
    pub fn score_text(&self, text: &str) -> Prediction {
        let tokens: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        let mut positive = 0usize;
        let mut negative = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            let vote = if POSITIVE_WORDS.contains(&token.as_str()) {
                1i8
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                -1
            } else {
                continue;
            };
            let negated = i > 0 && NEGATIONS.contains(&tokens[i - 1].as_str());
            match (vote > 0) != negated {
                true => positive += 1,
                false => negative += 1,
            }
        }

        let hits = positive + negative;
        let (label, score) = if positive > negative {
            ("POSITIVE", margin(positive - negative, hits))
        } else if negative > positive {
            ("NEGATIVE", margin(negative - positive, hits))
        } else {
            ("NEUTRAL", 0.5)
        };

        Prediction {
            label: label.to_string(),
            score,
        }
    }
}

fn margin(diff: usize, hits: usize) -> f64 {
    let raw = 0.5 + 0.5 * diff as f64 / hits as f64;
    (raw * 1000.0).round() / 1000.0
}

#[async_trait]
impl Classifier for LexiconClassifier {
    fn name(&self) -> &str {
        "lexicon"
    }

    async fn classify(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        Ok(texts.iter().map(|t| self.score_text(t)).collect())
    }
}
