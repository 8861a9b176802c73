//! Authentication and authorization steps.
//!
//! The steps hold no handler of their own. They look the configured handler
//! up in [`RouteState`] on every request, so a handler installed or swapped
//! after routes are composed applies to the next request.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::routing::{Flow, Middleware, RouteContext, StepResult};
use crate::state::RouteState;

/// Pluggable authentication handler.
///
/// Returns [`Flow::Continue`] to let the request through, [`Flow::Halt`]
/// after writing a response itself, or an error (usually a 401).
#[async_trait]
pub trait Authenticate: Send + Sync + 'static {
    async fn authenticate(&self, ctx: &mut RouteContext) -> StepResult;
}

/// Pluggable authorization handler, given the route's auth policy.
#[async_trait]
pub trait Authorize: Send + Sync + 'static {
    async fn authorize(&self, policy: &Value, ctx: &mut RouteContext) -> StepResult;
}

/// Closure-backed [`Authenticate`], see [`authenticate_fn`].
pub struct FnAuthenticate<F>(F);

pub fn authenticate_fn<F>(f: F) -> FnAuthenticate<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    FnAuthenticate(f)
}

#[async_trait]
impl<F> Authenticate for FnAuthenticate<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    async fn authenticate(&self, ctx: &mut RouteContext) -> StepResult {
        (self.0)(ctx).await
    }
}

/// Closure-backed [`Authorize`], see [`authorize_fn`].
pub struct FnAuthorize<F>(F);

pub fn authorize_fn<F>(f: F) -> FnAuthorize<F>
where
    F: for<'a> Fn(&'a Value, &'a mut RouteContext) -> BoxFuture<'a, StepResult>
        + Send
        + Sync
        + 'static,
{
    FnAuthorize(f)
}

#[async_trait]
impl<F> Authorize for FnAuthorize<F>
where
    F: for<'a> Fn(&'a Value, &'a mut RouteContext) -> BoxFuture<'a, StepResult>
        + Send
        + Sync
        + 'static,
{
    async fn authorize(&self, policy: &Value, ctx: &mut RouteContext) -> StepResult {
        (self.0)(policy, ctx).await
    }
}

/// Runs the configured [`Authenticate`] handler, or continues if none is set.
pub struct AuthenticateStep {
    state: Arc<RouteState>,
}

impl AuthenticateStep {
    pub fn new(state: Arc<RouteState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Middleware for AuthenticateStep {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        match self.state.authenticate_handler() {
            Some(handler) => handler.authenticate(ctx).await,
            None => Ok(Flow::Continue),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("authenticate")
    }
}

/// Runs the configured [`Authorize`] handler with the route policy.
pub struct AuthorizeStep {
    state: Arc<RouteState>,
    policy: Value,
}

impl AuthorizeStep {
    pub fn new(state: Arc<RouteState>, policy: Value) -> Self {
        Self { state, policy }
    }
}

#[async_trait]
impl Middleware for AuthorizeStep {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        match self.state.authorize_handler() {
            Some(handler) => handler.authorize(&self.policy, ctx).await,
            None => Ok(Flow::Continue),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("authorize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, HttpError};
    use crate::routing::RouteRequest;
    use axum::http::{Method, StatusCode, Uri};
    use serde_json::json;

    fn context() -> RouteContext {
        RouteContext::new(RouteRequest::new(Method::GET, Uri::from_static("/admin")))
    }

    #[tokio::test]
    async fn test_steps_are_noops_without_handlers() {
        let state = Arc::new(RouteState::default());
        let mut ctx = context();
        let authenticate = AuthenticateStep::new(state.clone());
        let authorize = AuthorizeStep::new(state, json!({"role": "admin"}));
        assert_eq!(authenticate.handle(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(authorize.handle(&mut ctx).await.unwrap(), Flow::Continue);
    }

    #[tokio::test]
    async fn test_authorize_receives_policy() {
        let state = Arc::new(RouteState::default());
        state.set_authorize(authorize_fn(|policy, ctx| {
            Box::pin(async move {
                ctx.locals.insert("policy".to_string(), policy.clone());
                if policy["role"] == "admin" {
                    Err(AppError::from(HttpError::forbidden("Admins only")))
                } else {
                    Ok(Flow::Continue)
                }
            })
        }));

        let mut ctx = context();
        let step = AuthorizeStep::new(state, json!({"role": "admin"}));
        let error = step.handle(&mut ctx).await.unwrap_err();
        assert_eq!(ctx.locals["policy"], json!({"role": "admin"}));
        match error {
            AppError::Http(http) => assert_eq!(http.status(), StatusCode::FORBIDDEN),
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_is_resolved_per_request() {
        let state = Arc::new(RouteState::default());
        let step = AuthenticateStep::new(state.clone());
        let mut ctx = context();
        assert_eq!(step.handle(&mut ctx).await.unwrap(), Flow::Continue);

        state.set_authenticate(authenticate_fn(|_ctx| {
            Box::pin(async move { Err(AppError::from(HttpError::unauthorized("Missing token"))) })
        }));
        assert!(step.handle(&mut ctx).await.is_err());

        state.clear_authenticate();
        assert_eq!(step.handle(&mut ctx).await.unwrap(), Flow::Continue);
    }
}
