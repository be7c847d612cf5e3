use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use spike_core::error::AnalysisError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Upstream data is missing; the client should retry later.
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::DataUnavailable(_) => {
                ApiError::Unavailable(format!("{err}; retry in a moment"))
            }
            AnalysisError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            AnalysisError::UnknownTicker(_) => ApiError::NotFound(err.to_string()),
            AnalysisError::ScoringFailure { .. } => {
                let err = anyhow::Error::new(err);
                sentry_anyhow::capture_anyhow(&err);
                ApiError::Internal(format!("{err:#}"))
            }
        }
    }
}
