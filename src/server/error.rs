use crate::letters::LetterError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// JSON error envelope returned by every failing endpoint.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

pub struct ApiError(pub LetterError);

impl From<LetterError> for ApiError {
    fn from(err: LetterError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(LetterError::Backend(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LetterError::Validation(_) => StatusCode::BAD_REQUEST,
            LetterError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            LetterError::NotFound => StatusCode::NOT_FOUND,
            LetterError::Forbidden => StatusCode::FORBIDDEN,
            LetterError::Backend(err) => {
                error!("Internal error: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self.0 {
            // Backend details stay in the logs.
            LetterError::Backend(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
