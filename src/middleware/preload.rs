//! Data preloading step.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::AppResult;
use crate::routing::{Flow, Middleware, PRELOAD_KEY, RouteContext, StepResult};

/// Loads data for the controller once the request has been validated.
#[async_trait]
pub trait Preload: Send + Sync + 'static {
    async fn load(&self, ctx: &mut RouteContext) -> AppResult<Value>;
}

/// Closure-backed [`Preload`], see [`preload_fn`].
pub struct FnPreload<F>(F);

pub fn preload_fn<F>(f: F) -> FnPreload<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, AppResult<Value>> + Send + Sync + 'static,
{
    FnPreload(f)
}

#[async_trait]
impl<F> Preload for FnPreload<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, AppResult<Value>> + Send + Sync + 'static,
{
    async fn load(&self, ctx: &mut RouteContext) -> AppResult<Value> {
        (self.0)(ctx).await
    }
}

/// Stores the preload result in `locals` under [`PRELOAD_KEY`].
pub struct PreloadStep {
    preload: Arc<dyn Preload>,
}

impl PreloadStep {
    pub fn new(preload: Arc<dyn Preload>) -> Self {
        Self { preload }
    }
}

#[async_trait]
impl Middleware for PreloadStep {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        let data = self.preload.load(ctx).await?;
        ctx.locals.insert(PRELOAD_KEY.to_string(), data);
        Ok(Flow::Continue)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("preload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, HttpError};
    use crate::routing::RouteRequest;
    use axum::http::{Method, Uri};
    use serde_json::json;

    fn context() -> RouteContext {
        RouteContext::new(
            RouteRequest::new(Method::GET, Uri::from_static("/users/7"))
                .with_part(crate::routing::RequestPart::Params, json!({"id": 7})),
        )
    }

    #[tokio::test]
    async fn test_result_lands_in_locals() {
        let step = PreloadStep::new(Arc::new(preload_fn(|ctx| {
            Box::pin(async move { Ok(json!({"id": ctx.req.params["id"], "name": "bob"})) })
        })));
        let mut ctx = context();
        assert_eq!(step.handle(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(ctx.preloaded(), Some(&json!({"id": 7, "name": "bob"})));
    }

    #[tokio::test]
    async fn test_failure_aborts() {
        let step = PreloadStep::new(Arc::new(preload_fn(|_ctx| {
            Box::pin(async move { Err(AppError::from(HttpError::not_found("User not found"))) })
        })));
        let mut ctx = context();
        assert!(step.handle(&mut ctx).await.is_err());
        assert!(ctx.preloaded().is_none());
    }
}
