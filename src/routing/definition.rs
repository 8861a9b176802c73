//! Route definitions: method, auth intent and the per-route options.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::routing::MethodFilter;
use serde_json::Value;

use crate::error::ComposeError;
use crate::middleware::{Controller, Preload};
use crate::routing::chain::Middleware;
use crate::routing::context::RequestPart;
use crate::schema::Schema;

/// HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Every method
    All,
    Options,
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::All => "all",
            Method::Options => "options",
            Method::Get => "get",
            Method::Post => "post",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }

    /// The axum filter for this method; `None` for [`Method::All`].
    pub fn filter(self) -> Option<MethodFilter> {
        match self {
            Method::All => None,
            Method::Options => Some(MethodFilter::OPTIONS),
            Method::Get => Some(MethodFilter::GET),
            Method::Post => Some(MethodFilter::POST),
            Method::Patch => Some(MethodFilter::PATCH),
            Method::Delete => Some(MethodFilter::DELETE),
        }
    }

    /// Whether two registrations on the same path would overlap.
    pub fn conflicts_with(self, other: Method) -> bool {
        self == other || self == Method::All || other == Method::All
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Method::All),
            "options" => Ok(Method::Options),
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            other => Err(ComposeError::InvalidMethod(other.to_string())),
        }
    }
}

/// Authentication intent of a route.
///
/// `Auth::None` and `Auth::Required(false)` both mean a public route;
/// `Auth::Policy` additionally runs the authorize handler with the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    None,
    Required(bool),
    Policy(Value),
}

impl Auth {
    /// True when the authenticate step must run.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Auth::Required(true) | Auth::Policy(_))
    }

    pub fn policy(&self) -> Option<&Value> {
        match self {
            Auth::Policy(policy) => Some(policy),
            _ => None,
        }
    }
}

impl From<bool> for Auth {
    fn from(required: bool) -> Self {
        Auth::Required(required)
    }
}

impl From<Value> for Auth {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Auth::None,
            Value::Bool(required) => Auth::Required(required),
            policy => Auth::Policy(policy),
        }
    }
}

/// Optional schemas for the four request parts.
#[derive(Clone, Default)]
pub struct ValidationSchemas {
    pub headers: Option<Arc<dyn Schema>>,
    pub query: Option<Arc<dyn Schema>>,
    pub params: Option<Arc<dyn Schema>>,
    pub body: Option<Arc<dyn Schema>>,
}

impl ValidationSchemas {
    pub fn get(&self, part: RequestPart) -> Option<&Arc<dyn Schema>> {
        match part {
            RequestPart::Headers => self.headers.as_ref(),
            RequestPart::Query => self.query.as_ref(),
            RequestPart::Params => self.params.as_ref(),
            RequestPart::Body => self.body.as_ref(),
        }
    }

    pub fn set(&mut self, part: RequestPart, schema: Arc<dyn Schema>) {
        let slot = match part {
            RequestPart::Headers => &mut self.headers,
            RequestPart::Query => &mut self.query,
            RequestPart::Params => &mut self.params,
            RequestPart::Body => &mut self.body,
        };
        *slot = Some(schema);
    }

    pub fn is_empty(&self) -> bool {
        RequestPart::ORDERED.iter().all(|part| self.get(*part).is_none())
    }
}

/// Everything a route needs besides its method and path.
///
/// # Example
/// ```ignore
/// let options = RouteOptions::new()
///     .auth(true)
///     .validate_body(TypedSchema::<CreateUser>::new())
///     .response(TypedSchema::<UserView>::new())
///     .controller(controller_fn(|ctx| Box::pin(async move { create_user(ctx).await })));
/// ```
#[derive(Clone, Default)]
pub struct RouteOptions {
    pub(crate) controller: Option<Arc<dyn Controller>>,
    pub(crate) auth: Option<Auth>,
    pub(crate) validate: ValidationSchemas,
    pub(crate) response: Option<Arc<dyn Schema>>,
    pub(crate) preload: Option<Arc<dyn Preload>>,
    pub(crate) pre: Vec<Arc<dyn Middleware>>,
    pub(crate) post: Vec<Arc<dyn Middleware>>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(mut self, controller: impl Controller) -> Self {
        self.controller = Some(Arc::new(controller));
        self
    }

    /// Accepts `bool`, `serde_json::Value` or an [`Auth`].
    pub fn auth(mut self, auth: impl Into<Auth>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn validate(mut self, part: RequestPart, schema: impl Schema) -> Self {
        self.validate.set(part, Arc::new(schema));
        self
    }

    pub fn validate_headers(self, schema: impl Schema) -> Self {
        self.validate(RequestPart::Headers, schema)
    }

    pub fn validate_query(self, schema: impl Schema) -> Self {
        self.validate(RequestPart::Query, schema)
    }

    pub fn validate_params(self, schema: impl Schema) -> Self {
        self.validate(RequestPart::Params, schema)
    }

    pub fn validate_body(self, schema: impl Schema) -> Self {
        self.validate(RequestPart::Body, schema)
    }

    /// Schema the controller result must satisfy.
    pub fn response(mut self, schema: impl Schema) -> Self {
        self.response = Some(Arc::new(schema));
        self
    }

    pub fn preload(mut self, preload: impl Preload) -> Self {
        self.preload = Some(Arc::new(preload));
        self
    }

    /// Appends a middleware that runs before validation.
    pub fn pre(mut self, middleware: impl Middleware) -> Self {
        self.pre.push(Arc::new(middleware));
        self
    }

    /// Appends a middleware that runs after the controller.
    pub fn post(mut self, middleware: impl Middleware) -> Self {
        self.post.push(Arc::new(middleware));
        self
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validated: Vec<&str> = RequestPart::ORDERED
            .iter()
            .filter(|part| self.validate.get(**part).is_some())
            .map(|part| part.as_str())
            .collect();
        f.debug_struct("RouteOptions")
            .field("controller", &self.controller.is_some())
            .field("auth", &self.auth)
            .field("validate", &validated)
            .field("response", &self.response.is_some())
            .field("preload", &self.preload.is_some())
            .field("pre", &self.pre.len())
            .field("post", &self.post.len())
            .finish()
    }
}

/// Checks a route path before it reaches axum.
pub(crate) fn check_path(path: &str) -> Result<(), ComposeError> {
    if path.is_empty() {
        return Err(ComposeError::invalid_path(path, "path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(ComposeError::invalid_path(path, "path must start with '/'"));
    }
    for segment in path.split('/') {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(ComposeError::invalid_path(
                path,
                "use '{param}' captures instead of ':param' or '*wildcard'",
            ));
        }
        let opens = segment.matches('{').count();
        let closes = segment.matches('}').count();
        if opens != closes || opens > 1 {
            return Err(ComposeError::invalid_path(path, "malformed '{param}' capture"));
        }
        if opens == 1
            && !(segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2)
        {
            return Err(ComposeError::invalid_path(path, "a capture must span the whole segment"));
        }
    }
    Ok(())
}
