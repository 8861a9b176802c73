use thiserror::Error;

/// Route definition errors, raised while composing routes at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Invalid method '{0}'. Valid methods are: all, options, get, post, patch, delete")]
    InvalidMethod(String),

    #[error("Invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Auth intent was never stated; public routes must say `Auth::None`
    #[error("Route {method} {path} must declare auth")]
    MissingAuth { method: String, path: String },

    #[error("Route {method} {path} has no controller")]
    MissingController { method: String, path: String },

    #[error("Auth policy for {method} {path} must be a JSON object")]
    InvalidAuthPolicy { method: String, path: String },

    #[error("Route {method} {path} is already registered")]
    DuplicateRoute { method: String, path: String },
}

impl ComposeError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ComposeError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
