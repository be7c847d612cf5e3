pub mod anthropic;
pub mod error;
pub mod gemini;

use crate::config::Settings;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
}

impl Provider {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "anthropic" | "claude" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => f.write_str("Gemini"),
            Provider::Anthropic => f.write_str("Anthropic"),
        }
    }
}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    /// One prompted completion; returns the generated text.
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Which provider to use given the configured credentials. `LLM_PROVIDER` wins when its
/// key is present; otherwise Gemini, then Anthropic. `None` when no key is configured.
pub fn select_provider(settings: &Settings) -> Option<Provider> {
    let has_key = |p: Provider| match p {
        Provider::Gemini => settings.gemini_api_key.is_some(),
        Provider::Anthropic => settings.anthropic_api_key.is_some(),
    };

    if let Some(requested) = settings.llm_provider.as_deref() {
        match Provider::parse(requested) {
            Some(p) if has_key(p) => return Some(p),
            Some(p) => {
                tracing::warn!(provider = %p, "LLM_PROVIDER has no API key configured; falling back")
            }
            None => tracing::warn!(value = requested, "unknown LLM_PROVIDER; ignoring"),
        }
    }

    [Provider::Gemini, Provider::Anthropic]
        .into_iter()
        .find(|p| has_key(*p))
}

/// Builds the configured text generator. `Ok(None)` means no credential: narratives
/// degrade to the templated explanation.
pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Box<dyn TextGenerator>>> {
    let generator: Box<dyn TextGenerator> = match select_provider(settings) {
        None => return Ok(None),
        Some(Provider::Gemini) => Box::new(gemini::GeminiClient::from_settings(settings)?),
        Some(Provider::Anthropic) => Box::new(anthropic::AnthropicClient::from_settings(settings)?),
    };
    Ok(Some(generator))
}
