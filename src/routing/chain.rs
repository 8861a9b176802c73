//! Ordered handler chain executed for one matched route.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{AppError, HttpError};
use crate::middleware::{ErrorFlow, ErrorHandler};
use crate::routing::context::{RouteContext, RouteRequest};

/// What a step tells the chain once it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next step
    Continue,
    /// Stop here; the step has written the response itself
    Halt,
}

/// Outcome of a single step: a [`Flow`] or the error that aborts the chain.
pub type StepResult = Result<Flow, AppError>;

/// A single step of a route chain.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult;

    /// Label used in registration logs.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("middleware")
    }
}

/// Closure-backed middleware, see [`middleware_fn`].
pub struct FnMiddleware<F>(F);

/// Wraps a closure as a [`Middleware`].
///
/// ```ignore
/// middleware_fn(|ctx| Box::pin(async move {
///     ctx.locals.insert("seen".into(), true.into());
///     Ok(Flow::Continue)
/// }))
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    FnMiddleware(f)
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RouteContext) -> StepResult {
        (self.0)(ctx).await
    }
}

/// Steps plus the error handlers that run when one of them fails.
pub struct Chain {
    steps: Vec<Arc<dyn Middleware>>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    body_limit: usize,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.step_names())
            .field("error_handlers", &self.error_handlers.len())
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl Chain {
    pub fn new(
        steps: Vec<Arc<dyn Middleware>>,
        error_handlers: Vec<Arc<dyn ErrorHandler>>,
        body_limit: usize,
    ) -> Self {
        Self {
            steps,
            error_handlers,
            body_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<Cow<'static, str>> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs the steps in order until one halts or fails.
    pub async fn run(&self, ctx: &mut RouteContext) -> Result<(), AppError> {
        for step in &self.steps {
            match step.handle(ctx).await? {
                Flow::Continue => {}
                Flow::Halt => {
                    debug!(step = %step.name(), "Chain halted");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Runs the steps and routes any failure through the error handlers.
    pub async fn dispatch(&self, ctx: &mut RouteContext) {
        if let Err(error) = self.run(ctx).await {
            self.fail(&error, ctx);
        }
    }

    /// Hands `error` to each error handler in order.
    ///
    /// If none of them wrote a response a generic 500 is sent.
    pub fn fail(&self, error: &AppError, ctx: &mut RouteContext) {
        for handler in &self.error_handlers {
            if handler.handle(error, ctx) == ErrorFlow::Stop {
                break;
            }
        }
        if !ctx.res.headers_sent() {
            let fallback = HttpError::internal(error.to_string());
            ctx.res.status(fallback.status());
            if let Err(send_error) = ctx.res.json(&fallback.payload()) {
                warn!(error = %send_error, "Failed to send fallback error response");
            }
        }
    }

    /// Axum entry point: decode the request, run the chain, build the response.
    pub(crate) async fn serve(&self, request: Request) -> Response {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let mut ctx = match RouteRequest::from_axum(request, self.body_limit).await {
            Ok(req) => RouteContext::new(req),
            Err(error) => {
                let mut ctx = RouteContext::new(RouteRequest::new(method, uri));
                self.fail(&error, &mut ctx);
                return ctx.res.into_response();
            }
        };

        self.dispatch(&mut ctx).await;

        if !ctx.res.headers_sent() {
            warn!(
                method = %ctx.req.method,
                url = %ctx.req.uri,
                "Chain finished without sending a response"
            );
        }
        ctx.res.into_response()
    }
}
