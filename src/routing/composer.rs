//! Turns route definitions into axum routes backed by a [`Chain`].

use std::fmt;
use std::sync::Arc;

use axum::{Router, extract::Request, routing};
use tracing::debug;

use crate::error::ComposeError;
use crate::middleware::{
    AuthenticateStep, AuthorizeStep, ControllerStep, ErrorHandler, ErrorNormalizer, PreloadStep,
    ValidateStep,
};
use crate::routing::chain::{Chain, Middleware};
use crate::routing::context::RequestPart;
use crate::routing::definition::{Auth, Method, RouteOptions, check_path};
use crate::schema::ValidateOptions;
use crate::state::RouteState;

/// Builds an axum [`Router`] out of route definitions.
///
/// Error handlers are captured by each route when it is registered, so
/// [`error_handler`](Self::error_handler) and
/// [`with_normalizer`](Self::with_normalizer) apply to routes added after them.
///
/// # Example
/// ```ignore
/// let state = Arc::new(RouteState::new(ConfigLoader::new().load()?));
/// let app = RouteComposer::new(state.clone())
///     .get("/users/{id}", RouteOptions::new().auth(true).controller(show_user))?
///     .post(
///         "/users",
///         RouteOptions::new().auth(json!({ "role": "admin" })).controller(create_user),
///     )?
///     .into_router();
/// ```
pub struct RouteComposer<S = ()> {
    router: Router<S>,
    state: Arc<RouteState>,
    normalizer: Arc<dyn ErrorHandler>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    registered: Vec<(Method, String)>,
}

impl<S> fmt::Debug for RouteComposer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteComposer")
            .field("routes", &self.registered)
            .field("error_handlers", &(self.error_handlers.len() + 1))
            .finish()
    }
}

impl<S> RouteComposer<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(state: Arc<RouteState>) -> Self {
        Self::from_router(Router::new(), state)
    }

    /// Composes onto an existing router.
    pub fn from_router(router: Router<S>, state: Arc<RouteState>) -> Self {
        Self {
            router,
            state,
            normalizer: Arc::new(ErrorNormalizer::default()),
            error_handlers: Vec::new(),
            registered: Vec::new(),
        }
    }

    /// Replaces the default error normalizer.
    pub fn with_normalizer(mut self, normalizer: ErrorNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Appends an error handler that runs after the normalizer.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handlers.push(Arc::new(handler));
        self
    }

    pub fn state(&self) -> &Arc<RouteState> {
        &self.state
    }

    /// Registers one route.
    pub fn route(
        mut self,
        method: Method,
        path: &str,
        options: RouteOptions,
    ) -> Result<Self, ComposeError> {
        if self
            .registered
            .iter()
            .any(|(m, p)| p == path && m.conflicts_with(method))
        {
            return Err(ComposeError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        let chain = build_chain(&self.state, self.handlers(), method, path, options)?;
        self.router = register(self.router, method, path, chain);
        self.registered.push((method, path.to_string()));
        Ok(self)
    }

    pub fn all(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::All, path, options)
    }

    pub fn options(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::Options, path, options)
    }

    pub fn get(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::Get, path, options)
    }

    pub fn post(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::Post, path, options)
    }

    pub fn patch(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::Patch, path, options)
    }

    pub fn delete(self, path: &str, options: RouteOptions) -> Result<Self, ComposeError> {
        self.route(Method::Delete, path, options)
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }

    fn handlers(&self) -> Vec<Arc<dyn ErrorHandler>> {
        std::iter::once(self.normalizer.clone())
            .chain(self.error_handlers.iter().cloned())
            .collect()
    }
}

/// Registers a single route on `router` with the default error normalizer.
///
/// Unlike [`RouteComposer`] this does not track earlier registrations;
/// registering the same method and path twice panics inside axum.
pub fn compose<S>(
    router: Router<S>,
    state: &Arc<RouteState>,
    method: Method,
    path: &str,
    options: RouteOptions,
) -> Result<Router<S>, ComposeError>
where
    S: Clone + Send + Sync + 'static,
{
    let handlers: Vec<Arc<dyn ErrorHandler>> = vec![Arc::new(ErrorNormalizer::default())];
    let chain = build_chain(state, handlers, method, path, options)?;
    Ok(register(router, method, path, chain))
}

/// Validates the definition and assembles its steps:
/// pre, validators, preload, authenticate, authorize, controller, post.
pub(crate) fn build_chain(
    state: &Arc<RouteState>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    method: Method,
    path: &str,
    options: RouteOptions,
) -> Result<Chain, ComposeError> {
    check_path(path)?;

    let RouteOptions {
        controller,
        auth,
        validate,
        response,
        preload,
        pre,
        post,
    } = options;

    let auth = auth.ok_or_else(|| ComposeError::MissingAuth {
        method: method.to_string(),
        path: path.to_string(),
    })?;
    if auth.policy().is_some_and(|policy| !policy.is_object()) {
        return Err(ComposeError::InvalidAuthPolicy {
            method: method.to_string(),
            path: path.to_string(),
        });
    }
    let controller = controller.ok_or_else(|| ComposeError::MissingController {
        method: method.to_string(),
        path: path.to_string(),
    })?;

    let config = state.config();
    let validate_options = ValidateOptions::lenient(config.validation.convert);

    let mut steps: Vec<Arc<dyn Middleware>> = pre;

    for part in RequestPart::ORDERED {
        if let Some(schema) = validate.get(part) {
            steps.push(Arc::new(ValidateStep::new(part, schema.clone(), validate_options)));
        }
    }

    if let Some(preload) = preload {
        steps.push(Arc::new(PreloadStep::new(preload)));
    }

    if auth.is_truthy() {
        steps.push(Arc::new(AuthenticateStep::new(state.clone())));
    }
    if let Auth::Policy(policy) = auth {
        steps.push(Arc::new(AuthorizeStep::new(state.clone(), policy)));
    }

    steps.push(Arc::new(ControllerStep::new(controller, response)));
    steps.extend(post);

    let chain = Chain::new(steps, error_handlers, config.body_limit);
    debug!(
        method = %method,
        path = %path,
        steps = ?chain.step_names(),
        "Route registered"
    );
    Ok(chain)
}

fn register<S>(router: Router<S>, method: Method, path: &str, chain: Chain) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let chain = Arc::new(chain);
    let handler = move |request: Request| {
        let chain = chain.clone();
        async move { chain.serve(request).await }
    };

    match method.filter() {
        Some(filter) => router.route(path, routing::on(filter, handler)),
        None => router.route(path, routing::any(handler)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::controller_fn;
    use serde_json::{Value, json};

    fn ok_controller() -> impl crate::middleware::Controller {
        controller_fn(|_ctx| Box::pin(async move { Ok(json!({ "ok": true })) }))
    }

    fn names(chain: &Chain) -> Vec<String> {
        chain.step_names().into_iter().map(|n| n.into_owned()).collect()
    }

    fn chain_for(options: RouteOptions) -> Result<Chain, ComposeError> {
        let state = Arc::new(RouteState::default());
        let handlers: Vec<Arc<dyn ErrorHandler>> = vec![Arc::new(ErrorNormalizer::default())];
        build_chain(&state, handlers, Method::Get, "/things", options)
    }

    #[test]
    fn test_minimal_chain_has_only_controller() {
        let chain =
            chain_for(RouteOptions::new().auth(Value::Null).controller(ok_controller())).unwrap();
        assert_eq!(names(&chain), vec!["controller"]);
    }

    #[test]
    fn test_policy_auth_adds_both_auth_steps() {
        let chain = chain_for(
            RouteOptions::new()
                .auth(json!({ "role": "admin" }))
                .controller(ok_controller()),
        )
        .unwrap();
        assert_eq!(names(&chain), vec!["authenticate", "authorize", "controller"]);

        let chain = chain_for(RouteOptions::new().auth(true).controller(ok_controller())).unwrap();
        assert_eq!(names(&chain), vec!["authenticate", "controller"]);
    }

    #[test]
    fn test_missing_auth_and_controller() {
        let err = chain_for(RouteOptions::new().controller(ok_controller())).unwrap_err();
        assert!(matches!(err, ComposeError::MissingAuth { .. }));

        let err = chain_for(RouteOptions::new().auth(false)).unwrap_err();
        assert!(matches!(err, ComposeError::MissingController { .. }));
    }

    #[test]
    fn test_non_object_policy_is_rejected() {
        let err = chain_for(RouteOptions::new().auth(json!("admin")).controller(ok_controller()))
            .unwrap_err();
        assert_eq!(
            err,
            ComposeError::InvalidAuthPolicy {
                method: "get".to_string(),
                path: "/things".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_routes() {
        let state = Arc::new(RouteState::default());
        let options = || RouteOptions::new().auth(false).controller(ok_controller());

        let composer: RouteComposer = RouteComposer::new(state)
            .get("/things", options())
            .unwrap()
            .post("/things", options())
            .unwrap();

        let err = composer.all("/things", options()).err().unwrap();
        assert_eq!(
            err,
            ComposeError::DuplicateRoute {
                method: "all".to_string(),
                path: "/things".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_path_fails_before_registration() {
        let state = Arc::new(RouteState::default());
        let composer: RouteComposer = RouteComposer::new(state);
        let err = composer
            .get("/users/:id", RouteOptions::new().auth(false).controller(ok_controller()))
            .err()
            .unwrap();
        assert!(matches!(err, ComposeError::InvalidPath { .. }));
    }
}
