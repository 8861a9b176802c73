//! Error normalization for route chains.
//!
//! [`ErrorNormalizer`] is the first error handler of every composed route.
//! It turns whatever a step failed with into an [`HttpError`], logs it at a
//! severity chosen by status code, writes the JSON error response if nothing
//! was sent yet, and lets the next error handler see the original error.
//!
//! # Status Code Mapping
//! - CsrfTokenMismatch → 401 UNAUTHORIZED
//! - NonError → 500 INTERNAL_SERVER_ERROR (logged as a warning first)
//! - Validation → 400 BAD_REQUEST with the failed constraints as details
//! - Http → its own status
//! - Internal → 500 INTERNAL_SERVER_ERROR

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{AppError, HttpError};
use crate::routing::RouteContext;

/// Result of an error handler: hand the error on, or end the error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFlow {
    Next,
    Stop,
}

/// Handler invoked when a chain step fails.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, error: &AppError, ctx: &mut RouteContext) -> ErrorFlow;
}

impl<F> ErrorHandler for F
where
    F: Fn(&AppError, &mut RouteContext) -> ErrorFlow + Send + Sync + 'static,
{
    fn handle(&self, error: &AppError, ctx: &mut RouteContext) -> ErrorFlow {
        self(error, ctx)
    }
}

/// Sink for error logs, one method per severity.
pub trait ErrorLogger: Send + Sync + 'static {
    fn info(&self, message: &str, context: &Value);
    fn warn(&self, message: &str, context: &Value);
    fn error(&self, message: &str, context: &Value);
}

/// Default [`ErrorLogger`] writing through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn info(&self, message: &str, context: &Value) {
        tracing::info!(target: "fusion_routes::errors", context = %context, "{message}");
    }

    fn warn(&self, message: &str, context: &Value) {
        tracing::warn!(target: "fusion_routes::errors", context = %context, "{message}");
    }

    fn error(&self, message: &str, context: &Value) {
        tracing::error!(target: "fusion_routes::errors", context = %context, "{message}");
    }
}

/// Log severity picked for a normalized error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// 500 is an error, anything above 501 a warning, the rest info.
    pub fn for_status(status: u16) -> Self {
        match status {
            500 => Severity::Error,
            s if s > 501 => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

/// Rewrites the error payload just before it is sent.
pub type PayloadTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Classifies, logs and answers chain errors.
#[derive(Clone)]
pub struct ErrorNormalizer {
    transform: Option<PayloadTransform>,
    logger: Arc<dyn ErrorLogger>,
}

impl fmt::Debug for ErrorNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorNormalizer")
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ErrorNormalizer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ErrorNormalizer {
    pub fn builder() -> ErrorNormalizerBuilder {
        ErrorNormalizerBuilder::default()
    }

    /// Converts any chain error into an [`HttpError`].
    pub fn normalize(&self, error: &AppError) -> HttpError {
        match error {
            AppError::CsrfTokenMismatch => HttpError::unauthorized("Unauthorized"),
            AppError::NonError { value } => {
                self.logger
                    .warn("Got non error in error handler", &json!({ "error": value }));
                HttpError::bad_implementation("Non error")
            }
            AppError::Validation(schema_error) => {
                HttpError::bad_request(schema_error.message())
                    .with_data(schema_error.details_value())
            }
            AppError::Http(http_error) => http_error.clone(),
            AppError::Internal { source } => HttpError::from_anyhow(source),
        }
    }

    fn log(&self, error: &HttpError, ctx: &RouteContext) -> Severity {
        let status = error.status().as_u16();
        let method = ctx.req.method.as_str();
        let url = ctx.req.url();
        let severity = Severity::for_status(status);

        match severity {
            Severity::Error => self.logger.error(
                "ERROR",
                &json!({
                    "status": status,
                    "method": method,
                    "url": url,
                    "message": error.message(),
                    "data": error.data(),
                    "stacktrace": error.stack(),
                }),
            ),
            Severity::Warn => self.logger.warn(
                "ERROR",
                &json!({
                    "status": status,
                    "method": method,
                    "url": url,
                    "message": error.message(),
                    "data": error.data(),
                }),
            ),
            Severity::Info => self.logger.info(
                "ERROR",
                &json!({
                    "status": status,
                    "method": method,
                    "url": url,
                    "message": error.message(),
                }),
            ),
        }
        severity
    }
}

impl ErrorHandler for ErrorNormalizer {
    fn handle(&self, error: &AppError, ctx: &mut RouteContext) -> ErrorFlow {
        let normalized = self.normalize(error);
        let severity = self.log(&normalized, ctx);

        if !ctx.res.headers_sent() {
            let mut payload = normalized.payload();
            if severity == Severity::Info {
                payload.details = normalized.data().cloned();
            }

            let mut body = match serde_json::to_value(&payload) {
                Ok(body) => body,
                Err(serialize_error) => {
                    tracing::error!(error = %serialize_error, "Failed to serialize error payload");
                    Value::Null
                }
            };
            if let Some(transform) = &self.transform {
                body = transform(body);
            }

            ctx.res.status(normalized.status());
            if let Err(send_error) = ctx.res.json(&body) {
                tracing::error!(error = %send_error, "Failed to send error response");
            }
        }

        ErrorFlow::Next
    }
}

/// Builder for [`ErrorNormalizer`].
#[derive(Default)]
pub struct ErrorNormalizerBuilder {
    transform: Option<PayloadTransform>,
    logger: Option<Arc<dyn ErrorLogger>>,
}

impl ErrorNormalizerBuilder {
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn logger(mut self, logger: impl ErrorLogger) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn shared_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> ErrorNormalizer {
        ErrorNormalizer {
            transform: self.transform,
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
        }
    }
}
