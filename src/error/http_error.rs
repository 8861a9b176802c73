//! Structured HTTP errors.
//!
//! An [`HttpError`] is the normalized form every request-time failure ends up
//! in before it is written to the client: a status code, a user-facing
//! message and optional structured detail data.

use std::backtrace::Backtrace;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

/// Message sent to clients in place of the real one for every 5xx error.
pub const GENERIC_SERVER_MESSAGE: &str = "An internal server error occurred";

/// Client-facing error body.
///
/// ```json
/// { "statusCode": 400, "error": "Bad Request", "message": "\"name\" is required" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// HTTP error carrying a status code, a message and optional detail data.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
    stack: Option<String>,
}

impl HttpError {
    /// Creates an error with the given status.
    ///
    /// Statuses below 400 are not errors and are coerced to 500. Server
    /// errors capture a backtrace of the construction site as their stack.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let status = if status.as_u16() < 400 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            status
        };
        let stack = status
            .is_server_error()
            .then(|| Backtrace::force_capture().to_string());
        Self {
            status,
            message: message.into(),
            data: None,
            stack,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// A 500 signalling a server-side contract bug rather than a client mistake.
    pub fn bad_implementation(message: impl Into<String>) -> Self {
        Self::internal(message)
    }

    /// [`bad_implementation`](Self::bad_implementation) with detail data attached.
    pub fn bad_implementation_with(message: impl Into<String>, data: Value) -> Self {
        Self::internal(message).with_data(data)
    }

    /// Wraps an opaque error as a 500, keeping its message and cause chain.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let mut normalized = Self::internal(error.to_string());
        normalized.stack = Some(format!("{error:?}"));
        normalized
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Backtrace of a server error, or the cause chain of a wrapped error.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn is_server(&self) -> bool {
        self.status.is_server_error()
    }

    /// Builds the sanitized client payload. 5xx messages are never exposed.
    pub fn payload(&self) -> ErrorPayload {
        let message = if self.is_server() {
            GENERIC_SERVER_MESSAGE.to_string()
        } else {
            self.message.clone()
        };
        ErrorPayload {
            status_code: self.status.as_u16(),
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message,
            details: None,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.payload())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_error_payload_keeps_message() {
        let error = HttpError::bad_request("\"name\" is required");
        let payload = error.payload();
        assert_eq!(payload.status_code, 400);
        assert_eq!(payload.error, "Bad Request");
        assert_eq!(payload.message, "\"name\" is required");
        assert!(payload.details.is_none());
    }

    #[test]
    fn test_server_error_payload_is_sanitized() {
        let error = HttpError::bad_implementation_with("Bad response", json!([{"path": "id"}]));
        let payload = error.payload();
        assert_eq!(payload.status_code, 500);
        assert_eq!(payload.error, "Internal Server Error");
        assert_eq!(payload.message, GENERIC_SERVER_MESSAGE);
        assert_eq!(error.message(), "Bad response");
        assert_eq!(error.data(), Some(&json!([{"path": "id"}])));
    }

    #[test]
    fn test_non_error_status_is_coerced() {
        let error = HttpError::new(StatusCode::FOUND, "redirect");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_errors_carry_a_stack() {
        assert!(HttpError::bad_implementation("Non error").stack().is_some());
        assert!(HttpError::new(StatusCode::SERVICE_UNAVAILABLE, "down").stack().is_some());
        assert!(HttpError::new(StatusCode::FOUND, "redirect").stack().is_some());
        assert!(HttpError::bad_request("nope").stack().is_none());
    }

    #[test]
    fn test_from_anyhow_keeps_chain() {
        let source = anyhow::anyhow!("connection reset").context("loading user");
        let error = HttpError::from_anyhow(&source);
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), "loading user");
        assert!(error.stack().unwrap_or_default().contains("connection reset"));
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let value = serde_json::to_value(HttpError::forbidden("nope").payload()).unwrap();
        assert_eq!(
            value,
            json!({"statusCode": 403, "error": "Forbidden", "message": "nope"})
        );
    }
}
