//! Route composition.
//!
//! A [`RouteComposer`] turns each [`RouteOptions`] definition into a
//! [`Chain`] of steps and mounts it on an axum router.

mod chain;
mod composer;
mod context;
mod definition;

pub use chain::{Chain, Flow, FnMiddleware, Middleware, StepResult, middleware_fn};
pub use composer::{RouteComposer, compose};
pub use context::{PRELOAD_KEY, RequestPart, RouteContext, RouteRequest, RouteResponse};
pub use definition::{Auth, Method, RouteOptions, ValidationSchemas};
