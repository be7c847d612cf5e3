use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No usable price rows for the requested window. The user has to retry.
    #[error("price data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("ticker {0} is not part of the current movers snapshot")]
    UnknownTicker(String),

    /// The classifier failed for a single headline.
    #[error("sentiment scoring failed for {text:?}: {source:#}")]
    ScoringFailure {
        text: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
