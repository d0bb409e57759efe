use std::future::Future;

use axum::extract::Query;
use axum::http::request::Parts;
use url::Url;

use crate::error::Error;
use crate::token::TokenSet;
use crate::types::{
    AuthorizationParams, CallbackChecks, CallbackParams, ClientMetadata, EndSessionParams,
};

/// The OIDC relying-party client the middleware delegates protocol work to.
///
/// Token validation, signature checks and the HTTP exchanges with the
/// provider all live behind this trait. The bundled
/// [`ProviderClient`](crate::ProviderClient) implements it with `reqwest`;
/// tests and embedders may substitute their own.
///
/// Implementations are shared across concurrent requests.
///
/// # Example
///
/// ```rust,ignore
/// impl OidcClient for MyClient {
///     fn metadata(&self) -> &ClientMetadata { &self.metadata }
///
///     fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, Error> {
///         self.inner.authorize_url(&params.state, &params.scope)
///     }
///
///     async fn callback(
///         &self,
///         redirect_uri: &str,
///         params: CallbackParams,
///         checks: CallbackChecks,
///     ) -> Result<TokenSet, Error> {
///         self.inner.exchange(redirect_uri, params, checks).await
///     }
///
///     async fn refresh(&self, token_set: &TokenSet) -> Result<TokenSet, Error> {
///         self.inner.refresh(token_set).await
///     }
///
///     fn end_session_url(&self, params: &EndSessionParams) -> Result<Url, Error> {
///         self.inner.logout_url(params)
///     }
/// }
/// ```
pub trait OidcClient: Send + Sync + 'static {
    /// Registration metadata (`redirect_uris`, `post_logout_redirect_uris`).
    fn metadata(&self) -> &ClientMetadata;

    /// Build the provider authorization URL carrying `params.state`.
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, Error>;

    /// Extract callback parameters from the incoming request.
    ///
    /// The default reads them from the query string; an unparsable query
    /// yields empty parameters, which then fail the state check.
    fn callback_params(&self, parts: &Parts) -> CallbackParams {
        Query::<CallbackParams>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default()
    }

    /// Exchange the callback parameters for a token set.
    fn callback(
        &self,
        redirect_uri: &str,
        params: CallbackParams,
        checks: CallbackChecks,
    ) -> impl Future<Output = Result<TokenSet, Error>> + Send;

    /// Obtain a fresh token set using the refresh token in `token_set`.
    fn refresh(&self, token_set: &TokenSet) -> impl Future<Output = Result<TokenSet, Error>> + Send;

    /// Build the provider end-session URL.
    fn end_session_url(&self, params: &EndSessionParams) -> Result<Url, Error>;
}
