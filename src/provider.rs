use url::Url;

use crate::types::ClientMetadata;

#[cfg(feature = "http-client")]
use crate::{
    discovery::ProviderMetadata,
    error::Error,
    middleware::OidcClient,
    token::{TokenResponse, TokenSet},
    types::{AuthorizationParams, CallbackChecks, CallbackParams, EndSessionParams},
};

/// OpenID Connect relying-party configuration.
///
/// Required fields are constructor parameters; the callback and
/// post-logout URIs default to locations under `base_url`.
///
/// ```rust,ignore
/// use oidc_session_middleware::OidcConfig;
///
/// let config = OidcConfig::new(
///     "https://idp.example.com/realms/app".parse()?,
///     "my-client-id",
///     "https://app.example.com".parse()?,
/// )
/// .with_client_secret("s3cret");
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) oidc_issuer: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) base_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) post_logout_redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("oidc_issuer", &self.oidc_issuer.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OidcConfig {
    /// Create a configuration for `client_id` registered at `oidc_issuer`.
    ///
    /// The redirect URI defaults to `{base_url}/auth/callback` and the
    /// post-logout redirect URI to `base_url` itself.
    #[must_use]
    pub fn new(oidc_issuer: Url, client_id: impl Into<String>, base_url: Url) -> Self {
        Self {
            oidc_issuer,
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: callback_uri(&base_url, "/auth"),
            post_logout_redirect_uri: base_url.clone(),
            base_url,
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, url: Url) -> Self {
        self.redirect_uri = url;
        self
    }

    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, url: Url) -> Self {
        self.post_logout_redirect_uri = url;
        self
    }

    /// Override the requested scopes (default: `["openid", "profile", "email"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn oidc_issuer(&self) -> &Url {
        &self.oidc_issuer
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Application base URL; the fallback redirect target on auth failures.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> &Url {
        &self.post_logout_redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Space-separated scope string for authorization requests.
    #[must_use]
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Client registration metadata derived from this configuration.
    #[must_use]
    pub fn client_metadata(&self) -> ClientMetadata {
        ClientMetadata::new(self.client_id.clone(), self.redirect_uri.as_str())
            .with_post_logout_redirect_uri(self.post_logout_redirect_uri.as_str())
    }
}

/// `{base_url}{auth_path}/callback`, keeping any path prefix of `base_url`.
pub(crate) fn callback_uri(base_url: &Url, auth_path: &str) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(auth_path.split('/').filter(|s| !s.is_empty()))
            .push("callback");
    }
    url
}

/// `reqwest`-backed [`OidcClient`] talking to a discovered provider.
#[cfg(feature = "http-client")]
#[derive(Clone)]
pub struct ProviderClient {
    config: OidcConfig,
    provider: ProviderMetadata,
    metadata: ClientMetadata,
    http: reqwest::Client,
}

#[cfg(feature = "http-client")]
impl ProviderClient {
    /// Create a client from already-known provider metadata.
    #[must_use]
    pub fn new(config: OidcConfig, provider: ProviderMetadata) -> Self {
        Self {
            metadata: config.client_metadata(),
            config,
            provider,
            http: reqwest::Client::new(),
        }
    }

    /// Discover the provider at `config.oidc_issuer` and create a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] or [`Error::Discovery`] if the discovery
    /// document cannot be fetched or does not describe the configured issuer.
    pub async fn discover(config: OidcConfig) -> Result<Self, Error> {
        let http = reqwest::Client::new();
        let provider = ProviderMetadata::discover(&http, &config.oidc_issuer).await?;
        tracing::info!(issuer = %provider.issuer, "Discovered OIDC provider");
        Ok(Self::new(config, provider).with_http_client(http))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &ProviderMetadata {
        &self.provider
    }

    async fn token_request(
        &self,
        form: Vec<(&str, &str)>,
        operation: &'static str,
    ) -> Result<TokenResponse, Error> {
        let mut form: Vec<(&str, &str)> = form;
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.provider.token_endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

#[cfg(feature = "http-client")]
impl OidcClient for ProviderClient {
    fn metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, Error> {
        let redirect_uri = params
            .redirect_uri
            .as_deref()
            .unwrap_or(self.config.redirect_uri.as_str());

        let mut url = self.provider.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &params.scope)
            .append_pair("state", &params.state);

        Ok(url)
    }

    async fn callback(
        &self,
        redirect_uri: &str,
        params: CallbackParams,
        checks: CallbackChecks,
    ) -> Result<TokenSet, Error> {
        if let Some(error) = params.error {
            return Err(Error::OAuth {
                operation: "authorization",
                status: None,
                detail: match params.error_description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                },
            });
        }

        if params.state.as_deref() != Some(checks.state.as_str()) {
            return Err(Error::StateMismatch);
        }

        if let Some(iss) = &params.iss {
            if iss.trim_end_matches('/') != self.provider.issuer.trim_end_matches('/') {
                return Err(Error::OAuth {
                    operation: "authorization",
                    status: None,
                    detail: format!("unexpected issuer '{iss}'"),
                });
            }
        }

        let code = params.code.ok_or_else(|| Error::OAuth {
            operation: "authorization",
            status: None,
            detail: "missing authorization code".into(),
        })?;

        let form = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        let response = self.token_request(form, "token exchange").await?;

        Ok(TokenSet::from_response(response, time::OffsetDateTime::now_utc()))
    }

    async fn refresh(&self, token_set: &TokenSet) -> Result<TokenSet, Error> {
        let refresh_token = token_set
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Token("token set has no refresh token".into()))?;

        let form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.token_request(form, "token refresh").await?;

        let refreshed = TokenSet::from_response(response, time::OffsetDateTime::now_utc());
        Ok(carry_over(refreshed, token_set))
    }

    fn end_session_url(&self, params: &EndSessionParams) -> Result<Url, Error> {
        let mut url = self.provider.end_session_endpoint.clone().ok_or_else(|| {
            Error::Discovery("provider does not advertise an end_session_endpoint".into())
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            if let Some(hint) = &params.id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
            if let Some(uri) = &params.post_logout_redirect_uri {
                query.append_pair("post_logout_redirect_uri", uri);
            }
        }

        Ok(url)
    }
}

/// Providers may omit the refresh and ID tokens from a refresh response;
/// keep the previous ones in that case.
#[cfg(feature = "http-client")]
fn carry_over(mut refreshed: TokenSet, previous: &TokenSet) -> TokenSet {
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = previous.refresh_token.clone();
    }
    if refreshed.id_token.is_none() {
        refreshed.id_token = previous.id_token.clone();
    }
    refreshed
}
