//! Built-in chain steps and the error path.
//!
//! This module contains the steps a composed route is assembled from
//! (validation, preload, authentication, authorization, controller) and the
//! error normalizer that answers their failures.

mod auth;
mod controller;
mod error_handler;
mod preload;
mod validate;

pub use auth::{
    Authenticate, AuthenticateStep, Authorize, AuthorizeStep, FnAuthenticate, FnAuthorize,
    authenticate_fn, authorize_fn,
};
pub use controller::{Controller, ControllerStep, FnController, controller_fn};
pub use error_handler::{
    ErrorFlow, ErrorHandler, ErrorLogger, ErrorNormalizer, ErrorNormalizerBuilder,
    PayloadTransform, Severity, TracingLogger,
};
pub use preload::{FnPreload, Preload, PreloadStep, preload_fn};
pub use validate::ValidateStep;
