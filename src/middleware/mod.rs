//! Server-side OpenID Connect session middleware for Axum.
//!
//! Handles the authorization-code login, the callback exchange, transparent
//! token refresh on protected routes, logout with provider end-session and
//! an idle-timeout probe. Tokens never leave the server: the browser only
//! holds the session cookie.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oidc_session_middleware::ProviderClient;
//! use oidc_session_middleware::middleware::{
//!     AuthState, MiddlewareOptions, OidcClaims, auth_routes, session_layer, token_set_middleware,
//! };
//! use tower_sessions::MemoryStore;
//!
//! // 1. Configure from environment
//! let options = MiddlewareOptions::from_env()?;
//!
//! // 2. Discover the provider
//! let client = ProviderClient::discover(options.oidc_config().clone()).await?;
//! let auth = AuthState::new(options.clone(), client);
//!
//! // 3. Protect routes, mount auth routes, add the session layer
//! async fn me(OidcClaims(claims): OidcClaims) -> String {
//!     claims.subject().unwrap_or("unknown").to_string()
//! }
//!
//! let app = axum::Router::new()
//!     .route("/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         auth.clone(),
//!         token_set_middleware::<ProviderClient>,
//!     ))
//!     .merge(auth_routes(auth))
//!     .layer(session_layer(&options, MemoryStore::default()));
//! ```

mod config;
pub mod controllers;
mod cookies;
mod error;
mod extractor;
mod routes;
mod session;
mod state;
#[cfg(test)]
mod test_support;
mod traits;
mod types;

pub use config::{BypassAuthentication, LandingRoute, MiddlewareOptions};
pub use error::AuthError;
pub use extractor::OidcClaims;
pub use routes::{auth_routes, token_set_middleware};
pub use session::{is_authenticated, session_layer, session_remaining_time};
pub use state::AuthState;
pub use traits::OidcClient;
pub use types::{AuthContext, OidcSession};
