use crate::config::{env_parse, non_empty_var, Settings};
use crate::sentiment::{ClassProbabilities, SentimentModel};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
const DEFAULT_MODEL: &str = "ProsusAI/finbert";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// FinBERT served by the Hugging Face inference API.
#[derive(Debug, Clone)]
pub struct HfInferenceModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
}

impl HfInferenceModel {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .sentiment_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = non_empty_var("SENTIMENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs =
            env_parse::<u64>("SENTIMENT_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS);

        if settings.hf_api_token.is_none() {
            tracing::warn!("HF_API_TOKEN not set; sentiment requests are anonymous and may be rate limited");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build sentiment http client")?;

        Ok(Self {
            http,
            base_url,
            model,
            api_token: settings.hf_api_token.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.api_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl SentimentModel for HfInferenceModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, text: &str) -> Result<ClassProbabilities> {
        let url = format!(
            "{}/models/{}",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&InferenceRequest { inputs: text })
            .send()
            .await
            .context("sentiment inference request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read sentiment inference response")?;
        if !status.is_success() {
            anyhow::bail!("sentiment inference HTTP {status}: {body}");
        }

        let parsed = serde_json::from_str::<InferenceResponse>(&body)
            .with_context(|| format!("unexpected sentiment inference payload: {body}"))?;
        probabilities(parsed.into_scores())
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl InferenceResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            InferenceResponse::Nested(v) => v.into_iter().next().unwrap_or_default(),
            InferenceResponse::Flat(v) => v,
        }
    }
}

fn probabilities(scores: Vec<LabelScore>) -> Result<ClassProbabilities> {
    let find = |name: &str| {
        scores
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(name))
            .map(|s| s.score)
            .with_context(|| format!("classifier output is missing class {name:?}"))
    };

    Ok(ClassProbabilities {
        negative: find("negative")?,
        neutral: find("neutral")?,
        positive: find("positive")?,
    })
}
