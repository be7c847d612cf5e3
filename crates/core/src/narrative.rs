//! Picks the headline that best fits a price move and turns it into a short explanation.

use crate::domain::news::ScoredHeadline;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::TextGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSign {
    Positive,
    NegativeOrZero,
}

impl ChangeSign {
    pub fn from_change(change_pct: f64) -> Self {
        if change_pct > 0.0 {
            ChangeSign::Positive
        } else {
            ChangeSign::NegativeOrZero
        }
    }

    pub fn direction(self) -> &'static str {
        match self {
            ChangeSign::Positive => "rose",
            ChangeSign::NegativeOrZero => "fell",
        }
    }
}

/// The most positive-sounding headline for a rise, the most negative-sounding one
/// otherwise. Ties keep the earliest headline.
///
/// This picks the story that reads most consistently with the move, not the one that
/// caused it.
pub fn select(scored: &[ScoredHeadline], sign: ChangeSign) -> Option<&ScoredHeadline> {
    let mut iter = scored.iter();
    let mut best = iter.next()?;
    for h in iter {
        let better = match sign {
            ChangeSign::Positive => h.sentiment_score > best.sentiment_score,
            ChangeSign::NegativeOrZero => h.sentiment_score < best.sentiment_score,
        };
        if better {
            best = h;
        }
    }
    Some(best)
}

fn summary_line(ticker: &str, change_pct: f64) -> String {
    let direction = ChangeSign::from_change(change_pct).direction();
    format!("📌 **{ticker} {direction} {:.2}%**", change_pct.abs())
}

pub fn no_news_explanation(ticker: &str, change_pct: f64) -> String {
    format!(
        "{} — No recent news available for explanation.",
        summary_line(ticker, change_pct)
    )
}

pub fn unavailable_explanation(ticker: &str, change_pct: f64, selected: &ScoredHeadline) -> String {
    format!(
        "{}\nKey Trigger: **{}**\nSentiment: **{} ({:.2})**\n⚠ No AI API key configured — cannot generate explanation.",
        summary_line(ticker, change_pct),
        selected.title(),
        selected.sentiment_label,
        selected.sentiment_score,
    )
}

pub fn build_prompt(ticker: &str, change_pct: f64, selected: &ScoredHeadline) -> String {
    let direction = ChangeSign::from_change(change_pct).direction();
    format!(
        "You are a financial market analyst. Explain the stock movement clearly.\n\n\
Stock: {ticker}\n\
Price Movement: {magnitude:.2}% ({direction})\n\
Key News Headline: \"{title}\"\n\
Sentiment Score: {label} ({score:.2})\n\n\
Generate a short and crisp explanation:\n\
- What could have caused the spike/drop?\n\
- Why does this specific headline matter?\n\
- Keep it factual, avoid speculation.\n\
- Keep it within 4-6 sentences.",
        magnitude = change_pct.abs(),
        title = selected.title(),
        label = selected.sentiment_label,
        score = selected.sentiment_score,
    )
}

/// Explains a move using the selected headline. Never fails: a generation error is
/// returned as visible text in place of the explanation.
pub async fn explain(
    ticker: &str,
    change_pct: f64,
    selected: Option<&ScoredHeadline>,
    generator: Option<&dyn TextGenerator>,
) -> String {
    let Some(selected) = selected else {
        return no_news_explanation(ticker, change_pct);
    };

    let Some(generator) = generator else {
        return unavailable_explanation(ticker, change_pct, selected);
    };

    let prompt = build_prompt(ticker, change_pct, selected);
    match generator.generate_text(&prompt).await {
        Ok(text) => format!(
            "{}\n\n🧠 **Reason:**\n{}",
            summary_line(ticker, change_pct),
            text
        ),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            if let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() {
                tracing::debug!(
                    stage = diag.stage,
                    raw_output = ?diag.raw_output,
                    raw_response_json = ?diag.raw_response_json,
                    "narrative generation diagnostics"
                );
            }
            tracing::warn!(
                %ticker,
                provider = %generator.provider(),
                error = %err,
                "narrative generation failed"
            );
            format!("{} error → {err:#}", generator.provider())
        }
    }
}
