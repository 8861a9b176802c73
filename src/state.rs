//! Shared route state.
//!
//! Holds the loaded configuration and the pluggable authentication and
//! authorization handlers. The composer hands an `Arc<RouteState>` to every
//! auth step it builds; the steps read the handler slots on each request.

use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ComposerConfig;
use crate::middleware::{Authenticate, Authorize};

#[derive(Clone, Default)]
struct AuthHandlers {
    authenticate: Option<Arc<dyn Authenticate>>,
    authorize: Option<Arc<dyn Authorize>>,
}

/// State shared by all routes of a [`RouteComposer`](crate::routing::RouteComposer).
///
/// Handler slots are meant to be filled during startup, before traffic
/// arrives. Reads take a short read lock that is released before the handler
/// runs.
#[derive(Default)]
pub struct RouteState {
    config: ComposerConfig,
    auth: RwLock<AuthHandlers>,
}

impl RouteState {
    /// Creates state from a loaded configuration with empty handler slots.
    ///
    /// # Example
    /// ```ignore
    /// let config = ConfigLoader::new().load()?;
    /// let state = Arc::new(RouteState::new(config));
    /// state.set_authenticate(JwtAuthenticate::new(secret));
    /// ```
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            auth: RwLock::new(AuthHandlers::default()),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn set_authenticate(&self, handler: impl Authenticate) {
        self.write(|handlers| handlers.authenticate = Some(Arc::new(handler)));
    }

    pub fn set_authorize(&self, handler: impl Authorize) {
        self.write(|handlers| handlers.authorize = Some(Arc::new(handler)));
    }

    pub fn clear_authenticate(&self) {
        self.write(|handlers| handlers.authenticate = None);
    }

    pub fn clear_authorize(&self) {
        self.write(|handlers| handlers.authorize = None);
    }

    pub fn authenticate_handler(&self) -> Option<Arc<dyn Authenticate>> {
        self.read().authenticate
    }

    pub fn authorize_handler(&self) -> Option<Arc<dyn Authorize>> {
        self.read().authorize
    }

    fn read(&self) -> AuthHandlers {
        self.auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self, update: impl FnOnce(&mut AuthHandlers)) {
        let mut handlers = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut handlers);
    }
}
