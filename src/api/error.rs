use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::market_data::FetchError;

/// Errors surfaced to HTTP clients as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No data found for the given symbol.")]
    NotFound,

    #[error("An error occurred while fetching stock data: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoData { .. } => Self::NotFound,
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "detail": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
