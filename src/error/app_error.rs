use serde_json::Value;
use thiserror::Error;

use crate::error::HttpError;
use crate::schema::SchemaError;

/// Request-time error raised by any step of a route chain.
///
/// Every variant is turned into an [`HttpError`] by the error normalizer;
/// steps only need to pick the variant that describes what went wrong.
#[derive(Error, Debug)]
pub enum AppError {
    /// A request part failed its declared schema
    #[error("{0}")]
    Validation(#[from] SchemaError),

    /// An already structured HTTP error
    #[error(transparent)]
    Http(#[from] HttpError),

    /// CSRF token missing or mismatched
    #[error("Invalid CSRF token")]
    CsrfTokenMismatch,

    /// A plain value was raised instead of an error
    #[error("Non-error value raised: {value}")]
    NonError { value: Value },

    /// Internal error for unexpected failures
    #[error("{source}")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Raises an arbitrary value, the way a handler might throw a string.
    pub fn thrown(value: impl Into<Value>) -> Self {
        AppError::NonError {
            value: value.into(),
        }
    }

    pub fn internal(message: impl std::fmt::Display + Send + Sync + 'static) -> Self {
        AppError::Internal {
            source: anyhow::anyhow!("{message}"),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
