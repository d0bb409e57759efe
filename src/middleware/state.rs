use std::sync::Arc;

use super::config::MiddlewareOptions;
use super::traits::OidcClient;

/// Shared state for the auth handlers and the token-set middleware.
///
/// Cheap to clone; both halves are immutable after construction.
pub struct AuthState<C> {
    pub(crate) client: Arc<C>,
    pub(crate) options: Arc<MiddlewareOptions>,
}

impl<C: OidcClient> AuthState<C> {
    #[must_use]
    pub fn new(options: MiddlewareOptions, client: C) -> Self {
        Self {
            client: Arc::new(client),
            options: Arc::new(options),
        }
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn options(&self) -> &MiddlewareOptions {
        &self.options
    }
}

// Manual Clone: avoid derive adding a `C: Clone` bound.
impl<C> Clone for AuthState<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            options: self.options.clone(),
        }
    }
}
