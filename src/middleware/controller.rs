//! Controller invocation and response shaping.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{AppResult, HttpError};
use crate::routing::{Flow, Middleware, RouteContext, StepResult};
use crate::schema::{Schema, ValidateOptions};

/// Route controller.
///
/// The returned value is shaped into the response by [`ControllerStep`]:
/// `Value::Null` becomes `204 No Content`, anything else `200` JSON. A
/// controller may instead write `ctx.res` itself; the step then leaves the
/// response alone and skips the response schema.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    async fn call(&self, ctx: &mut RouteContext) -> AppResult<Value>;
}

/// Closure-backed [`Controller`], see [`controller_fn`].
pub struct FnController<F>(F);

/// Wraps a closure as a [`Controller`].
///
/// ```ignore
/// controller_fn(|ctx| Box::pin(async move {
///     Ok(json!({ "id": ctx.req.params["id"] }))
/// }))
/// ```
pub fn controller_fn<F>(f: F) -> FnController<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, AppResult<Value>> + Send + Sync + 'static,
{
    FnController(f)
}

#[async_trait]
impl<F> Controller for FnController<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, AppResult<Value>> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut RouteContext) -> AppResult<Value> {
        (self.0)(ctx).await
    }
}

/// Invokes the controller and writes its result.
pub struct ControllerStep {
    controller: Arc<dyn Controller>,
    response: Option<Arc<dyn Schema>>,
    options: ValidateOptions,
}

impl ControllerStep {
    pub fn new(controller: Arc<dyn Controller>, response: Option<Arc<dyn Schema>>) -> Self {
        Self {
            controller,
            response,
            options: ValidateOptions::default(),
        }
    }
}

#[async_trait]
impl Middleware for ControllerStep {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        let result = self.controller.call(ctx).await?;

        if ctx.res.headers_sent() {
            return Ok(Flow::Continue);
        }

        if result.is_null() {
            ctx.res.status(StatusCode::NO_CONTENT).end()?;
            return Ok(Flow::Continue);
        }

        let body = match &self.response {
            Some(schema) => schema.validate(result, &self.options).map_err(|error| {
                HttpError::bad_implementation_with("Bad response", error.details_value())
            })?,
            None => result,
        };

        ctx.res.status(StatusCode::OK).json(&body)?;
        Ok(Flow::Continue)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("controller")
    }
}
