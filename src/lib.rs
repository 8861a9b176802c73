//! fusion-routes
//!
//! Declarative route composition for axum: each route states its auth intent,
//! request schemas, optional preload and response schema, and gets a fixed
//! chain of steps plus a normalized error response.

pub mod config;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routing;
pub mod schema;
pub mod state;

pub use crate::config::{ComposerConfig, ConfigLoader};
pub use error::{AppError, AppResult, ComposeError, HttpError};
pub use routing::{Auth, Flow, Method, RouteComposer, RouteContext, RouteOptions, compose};
pub use state::RouteState;
