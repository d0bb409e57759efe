use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::AuthError;
use super::types::AuthContext;
use crate::token::Claims;

/// Claims of the authenticated user, attached by the token-set middleware.
///
/// Use as an Axum extractor on routes behind
/// [`token_set_middleware`](super::token_set_middleware). Returns
/// `401 Unauthorized` if the request is anonymous.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(OidcClaims(claims): OidcClaims) -> impl IntoResponse {
///     format!("Hello, {}", claims.subject().unwrap_or("unknown"))
/// }
///
/// // Accessible to both authenticated and anonymous users
/// async fn public(context: AuthContext) -> impl IntoResponse {
///     match context.claims {
///         Some(claims) => format!("Hello, {}", claims.subject().unwrap_or("unknown")),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OidcClaims(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for OidcClaims {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|context| context.claims.clone())
            .map(OidcClaims)
            .ok_or(AuthError::Unauthenticated)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}
