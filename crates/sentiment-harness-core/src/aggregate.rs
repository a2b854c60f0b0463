//! Summary statistics over per-unit predictions.
//!
//! Labels are bucketed by prefix: a label whose trimmed, uppercased form
//! starts with the positive marker counts as positive, one that starts with
//! the negative marker counts as negative, and everything else is neutral.
//! Neutral is therefore `total - positive - negative`; a capability that
//! emits an explicit neutral label lands in the same bucket.

use crate::models::{Prediction, Summary, Verdict};

/// Label prefixes that identify the two polar classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarityMarkers {
    pub positive: String,
    pub negative: String,
}

impl PolarityMarkers {
    pub fn new(positive: &str, negative: &str) -> Self {
        Self {
            positive: positive.trim().to_uppercase(),
            negative: negative.trim().to_uppercase(),
        }
    }

    pub fn polarity(&self, label: &str) -> Polarity {
        let normalized = label.trim().to_uppercase();
        if normalized.starts_with(&self.positive) {
            Polarity::Positive
        } else if normalized.starts_with(&self.negative) {
            Polarity::Negative
        } else {
            Polarity::Neutral
        }
    }
}

impl Default for PolarityMarkers {
    fn default() -> Self {
        Self::new("POS", "NEG")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

/// Build the [`Summary`] of a batch of predictions.
pub fn summarize(results: &[Prediction], markers: &PolarityMarkers) -> Summary {
    let total = results.len();
    let (positive, negative) =
        results
            .iter()
            .fold((0, 0), |(pos, neg), r| match markers.polarity(&r.label) {
                Polarity::Positive => (pos + 1, neg),
                Polarity::Negative => (pos, neg + 1),
                Polarity::Neutral => (pos, neg),
            });

    let overall = if total == 0 {
        None
    } else if positive > negative {
        Some(Verdict::Positive)
    } else if negative > positive {
        Some(Verdict::Negative)
    } else {
        Some(Verdict::Mixed)
    };

    Summary {
        total,
        positive,
        negative,
        neutral: total - positive - negative,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(labels: &[&str]) -> Vec<Prediction> {
        labels
            .iter()
            .map(|l| Prediction {
                label: l.to_string(),
                score: 0.5,
            })
            .collect()
    }

    #[test]
    fn test_empty_summary() {
        let s = summarize(&[], &PolarityMarkers::default());
        assert_eq!(
            s,
            Summary {
                total: 0,
                positive: 0,
                negative: 0,
                neutral: 0,
                overall: None,
            }
        );
        assert_eq!(
            serde_json::to_value(&s).unwrap()["overall"],
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_majority_positive() {
        let s = summarize(
            &preds(&["POSITIVE", "positive", "NEGATIVE", "neutral"]),
            &PolarityMarkers::default(),
        );
        assert_eq!((s.total, s.positive, s.negative, s.neutral), (4, 2, 1, 1));
        assert_eq!(s.overall, Some(Verdict::Positive));
    }

    #[test]
    fn test_majority_negative() {
        let s = summarize(&preds(&["neg", " Negative ", "POS"]), &PolarityMarkers::default());
        assert_eq!(s.overall, Some(Verdict::Negative));
    }

    #[test]
    fn test_tie_is_mixed() {
        let s = summarize(&preds(&["POSITIVE", "NEGATIVE"]), &PolarityMarkers::default());
        assert_eq!(s.overall, Some(Verdict::Mixed));

        let all_neutral = summarize(&preds(&["neutral", "other"]), &PolarityMarkers::default());
        assert_eq!(all_neutral.neutral, 2);
        assert_eq!(all_neutral.overall, Some(Verdict::Mixed));
    }

    #[test]
    fn test_custom_markers() {
        let markers = PolarityMarkers::new("label_2", "label_0");
        let s = summarize(&preds(&["LABEL_2", "LABEL_0", "LABEL_1", "LABEL_2"]), &markers);
        assert_eq!((s.positive, s.negative, s.neutral), (2, 1, 1));
        assert_eq!(s.overall, Some(Verdict::Positive));
    }

    #[test]
    fn test_counts_always_add_up() {
        let vocab = ["POSITIVE", "NEGATIVE", "NEUTRAL", "pos", "Neg", "", "x"];
        for n in 1..40usize {
            let labels: Vec<&str> = (0..n).map(|i| vocab[(i * 7 + n) % vocab.len()]).collect();
            let s = summarize(&preds(&labels), &PolarityMarkers::default());
            assert_eq!(s.positive + s.negative + s.neutral, s.total);
            assert_eq!(s.total, n);
            let expected = match s.positive.cmp(&s.negative) {
                std::cmp::Ordering::Greater => Verdict::Positive,
                std::cmp::Ordering::Less => Verdict::Negative,
                std::cmp::Ordering::Equal => Verdict::Mixed,
            };
            assert_eq!(s.overall, Some(expected));
        }
    }
}
