//! Headline sentiment from a three-class financial classifier.
//!
//! The label is the arg-max class and the score is `P(positive) - P(negative)`. The two are
//! kept independently: near the neutral boundary a headline can be labelled `neutral` while
//! carrying a slightly signed score.

pub mod hf;

use crate::domain::news::{Headline, ScoredHeadline, SentimentLabel};
use crate::error::{AnalysisError, Result};

pub use hf::HfInferenceModel;

/// Class probabilities in the classifier's fixed order: negative, neutral, positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    pub fn as_array(&self) -> [f64; 3] {
        [self.negative, self.neutral, self.positive]
    }

    fn validate(&self) -> anyhow::Result<()> {
        for p in self.as_array() {
            anyhow::ensure!(
                p.is_finite() && (0.0..=1.0).contains(&p),
                "class probability out of range: {p}"
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait SentimentModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn classify(&self, text: &str) -> anyhow::Result<ClassProbabilities>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Sentiment {
    pub fn from_probabilities(probs: &ClassProbabilities) -> Self {
        const LABELS: [SentimentLabel; 3] = [
            SentimentLabel::Negative,
            SentimentLabel::Neutral,
            SentimentLabel::Positive,
        ];

        // First maximum wins.
        let arr = probs.as_array();
        let mut best = 0;
        for (i, p) in arr.iter().enumerate().skip(1) {
            if *p > arr[best] {
                best = i;
            }
        }

        Self {
            label: LABELS[best],
            score: (probs.positive - probs.negative).clamp(-1.0, 1.0),
        }
    }
}

pub async fn score(model: &dyn SentimentModel, text: &str) -> Result<Sentiment> {
    let probs = model
        .classify(text)
        .await
        .and_then(|p| p.validate().map(|_| p))
        .map_err(|source| AnalysisError::ScoringFailure {
            text: text.to_string(),
            source,
        })?;
    Ok(Sentiment::from_probabilities(&probs))
}

/// Scores each headline title independently. A headline the classifier fails on is
/// logged and left out; the rest of the batch still gets scored.
pub async fn score_headlines(
    model: &dyn SentimentModel,
    headlines: Vec<Headline>,
) -> Vec<ScoredHeadline> {
    let mut out = Vec::with_capacity(headlines.len());
    for headline in headlines {
        match score(model, &headline.title).await {
            Ok(s) => out.push(ScoredHeadline {
                headline,
                sentiment_label: s.label,
                sentiment_score: s.score,
            }),
            Err(err) => {
                tracing::warn!(
                    model = model.model_name(),
                    link = %headline.link,
                    error = %err,
                    "headline excluded from scored list"
                );
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Fixed probabilities per exact text; unknown texts fail.
    pub struct StubModel {
        pub table: HashMap<String, ClassProbabilities>,
    }

    impl StubModel {
        pub fn new(entries: &[(&str, [f64; 3])]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(t, [n, u, p])| {
                        (
                            t.to_string(),
                            ClassProbabilities {
                                negative: *n,
                                neutral: *u,
                                positive: *p,
                            },
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl SentimentModel for StubModel {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn classify(&self, text: &str) -> anyhow::Result<ClassProbabilities> {
            self.table
                .get(text)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("inference backend unavailable"))
        }
    }
}
