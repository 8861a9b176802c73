//! Per-part request validation step.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::routing::{Flow, Middleware, RequestPart, RouteContext, StepResult};
use crate::schema::{Schema, ValidateOptions, merge_unknown};

/// Validates one request part and replaces it with the normalized value.
///
/// Keys the schema does not know about are kept. A failure aborts the chain
/// with [`AppError::Validation`](crate::error::AppError::Validation).
pub struct ValidateStep {
    part: RequestPart,
    schema: Arc<dyn Schema>,
    options: ValidateOptions,
}

impl ValidateStep {
    pub fn new(part: RequestPart, schema: Arc<dyn Schema>, options: ValidateOptions) -> Self {
        Self {
            part,
            schema,
            options,
        }
    }
}

#[async_trait]
impl Middleware for ValidateStep {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        let original = ctx.req.replace_part(self.part, Value::Null);
        match self.schema.validate(original.clone(), &self.options) {
            Ok(normalized) => {
                let value = if self.options.strip_unknown {
                    normalized
                } else {
                    merge_unknown(original, normalized)
                };
                ctx.req.replace_part(self.part, value);
                Ok(Flow::Continue)
            }
            Err(error) => {
                ctx.req.replace_part(self.part, original);
                Err(error.into())
            }
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("validate:{}", self.part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::routing::RouteRequest;
    use crate::schema::TypedSchema;
    use axum::http::{Method, Uri};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use validator::Validate;

    #[derive(Debug, Deserialize, Serialize, Validate)]
    struct Search {
        #[validate(length(min = 1))]
        q: String,
        #[serde(default = "default_limit")]
        limit: u32,
    }

    fn default_limit() -> u32 {
        10
    }

    fn step(part: RequestPart) -> ValidateStep {
        ValidateStep::new(
            part,
            Arc::new(TypedSchema::<Search>::new()),
            ValidateOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_success_replaces_part_and_continues() {
        let mut ctx = RouteContext::new(
            RouteRequest::new(Method::GET, Uri::from_static("/search"))
                .with_part(RequestPart::Query, json!({"q": "rust", "limit": "5", "trace": "1"})),
        );
        assert_eq!(step(RequestPart::Query).handle(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(ctx.req.query, json!({"q": "rust", "limit": 5, "trace": "1"}));
    }

    #[tokio::test]
    async fn test_defaults_are_filled_in() {
        let mut ctx = RouteContext::new(
            RouteRequest::new(Method::POST, Uri::from_static("/search"))
                .with_part(RequestPart::Body, json!({"q": "rust"})),
        );
        step(RequestPart::Body).handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.req.body, json!({"q": "rust", "limit": 10}));
    }

    #[tokio::test]
    async fn test_failure_is_validation_error_and_keeps_part() {
        let mut ctx = RouteContext::new(
            RouteRequest::new(Method::POST, Uri::from_static("/search"))
                .with_part(RequestPart::Body, json!({"q": ""})),
        );
        let error = step(RequestPart::Body).handle(&mut ctx).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
        assert_eq!(ctx.req.body, json!({"q": ""}));
    }

    #[test]
    fn test_name_includes_part() {
        assert_eq!(step(RequestPart::Headers).name(), "validate:headers");
    }
}
