//! HTTP error type. Every failure reaches the client as `{"error": "..."}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::calculators::CalculatorError;
use crate::futures::FuturesError;
use crate::holdings::HoldingError;
use crate::prices::PriceError;
use crate::quiz::QuizError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Holding(#[from] HoldingError),
    #[error(transparent)]
    Futures(#[from] FuturesError),
    #[error(transparent)]
    Calculator(#[from] CalculatorError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::Holding(_)
            | ApiError::Calculator(_)
            | ApiError::Quiz(_) => StatusCode::BAD_REQUEST,
            ApiError::Futures(FuturesError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Futures(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) | ApiError::Price(PriceError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Price(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Database(e) => error!(error = %e, "database error"),
            ApiError::Internal(msg) => error!(error = %msg, "internal error"),
            ApiError::Price(e) if status == StatusCode::BAD_GATEWAY => {
                error!(error = %e, "price upstream error")
            }
            _ => {}
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
