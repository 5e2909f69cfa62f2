use thiserror::Error;

/// Errors surfaced by letter operations.
///
/// Validation never reaches the store; quota and capacity rejections abort
/// before any mutation; store failures are wrapped as `Backend` and are
/// never treated as success (the rate limiter in particular must not fail
/// open).
#[derive(Debug, Error)]
pub enum LetterError {
    #[error("{0}")]
    Validation(String),

    #[error("Daily send limit reached ({sent_today}/{limit})")]
    QuotaExceeded { sent_today: i64, limit: i64 },

    #[error("Letter not found")]
    NotFound,

    #[error("Not allowed to perform this action on this letter")]
    Forbidden,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl LetterError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        LetterError::Validation(message.into())
    }

    /// Stable machine-readable code used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LetterError::Validation(_) => "validation_error",
            LetterError::QuotaExceeded { .. } => "quota_exceeded",
            LetterError::NotFound => "not_found",
            LetterError::Forbidden => "forbidden",
            LetterError::Backend(_) => "backend_error",
        }
    }
}
