use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;
use time::Duration;
use url::Url;

use super::error::AuthError;
use crate::provider::{OidcConfig, callback_uri};

/// Computes where to send a user once they are authenticated.
pub type LandingRoute = Arc<dyn Fn(&Parts) -> String + Send + Sync>;

/// Per-capability authentication bypass, for local development and testing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct BypassAuthentication {
    /// Login redirects straight to the landing route.
    pub login: bool,
    /// The token-set middleware passes requests through untouched.
    pub token_set: bool,
    /// The idle-remaining-time endpoint reports a fixed value.
    pub session_idle_remaining_time: bool,
}

impl BypassAuthentication {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn all() -> Self {
        Self {
            login: true,
            token_set: true,
            session_idle_remaining_time: true,
        }
    }

    #[must_use]
    pub fn with_login(mut self, bypass: bool) -> Self {
        self.login = bypass;
        self
    }

    #[must_use]
    pub fn with_token_set(mut self, bypass: bool) -> Self {
        self.token_set = bypass;
        self
    }

    #[must_use]
    pub fn with_session_idle_remaining_time(mut self, bypass: bool) -> Self {
        self.session_idle_remaining_time = bypass;
        self
    }

    /// Parse a comma-separated list such as `"login,token_set"`.
    fn parse(list: &str) -> Result<Self, AuthError> {
        let mut bypass = Self::none();
        for flag in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match flag {
                "login" => bypass.login = true,
                "token_set" => bypass.token_set = true,
                "session_idle_remaining_time" => bypass.session_idle_remaining_time = true,
                "all" => bypass = Self::all(),
                other => {
                    return Err(AuthError::Config(format!(
                        "BYPASS_AUTHENTICATION: unknown flag '{other}'"
                    )));
                }
            }
        }
        Ok(bypass)
    }
}

/// Immutable middleware configuration supplied by the embedding application.
///
/// Required fields (`application_domain`, `oidc_config`) are constructor
/// parameters. Use [`from_env()`](MiddlewareOptions::from_env) for
/// convention-based setup, or [`new()`](MiddlewareOptions::new) with `with_*`
/// methods for full control.
#[derive(Clone)]
pub struct MiddlewareOptions {
    pub(crate) application_domain: String,
    pub(crate) oidc_config: OidcConfig,
    pub(crate) landing_route: LandingRoute,
    pub(crate) bypass: BypassAuthentication,
    pub(crate) auth_path: String,
    pub(crate) session_cookie_name: String,
    pub(crate) session_idle_timeout: Duration,
    pub(crate) secure_cookies: bool,
}

impl fmt::Debug for MiddlewareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareOptions")
            .field("application_domain", &self.application_domain)
            .field("oidc_config", &self.oidc_config)
            .field("bypass", &self.bypass)
            .field("auth_path", &self.auth_path)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_idle_timeout", &self.session_idle_timeout)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl MiddlewareOptions {
    /// Create options with the required fields.
    ///
    /// Authenticated users land on `/` unless
    /// [`with_landing_route`](Self::with_landing_route) says otherwise.
    #[must_use]
    pub fn new(application_domain: impl Into<String>, oidc_config: OidcConfig) -> Self {
        Self {
            application_domain: application_domain.into(),
            oidc_config,
            landing_route: Arc::new(|_: &Parts| "/".to_string()),
            bypass: BypassAuthentication::none(),
            auth_path: "/auth".into(),
            session_cookie_name: "oidc.sid".into(),
            session_idle_timeout: Duration::minutes(30),
            secure_cookies: true,
        }
    }

    /// Create options from environment variables.
    ///
    /// # Required env vars
    /// - `APPLICATION_DOMAIN`: cookie domain of the application
    /// - `OIDC_ISSUER`: issuer URL of the identity provider
    /// - `OIDC_CLIENT_ID`: registered client ID
    /// - `OIDC_BASE_URL`: public base URL of the application
    ///
    /// # Optional env vars
    /// - `OIDC_CLIENT_SECRET`: confidential client secret
    /// - `OIDC_REDIRECT_URI`: override the callback URI
    /// - `OIDC_POST_LOGOUT_REDIRECT_URI`: override the post-logout URI
    /// - `OIDC_SCOPES`: comma-separated scopes
    /// - `OIDC_AUTH_PATH`: mount path of the auth routes (default `/auth`)
    /// - `SESSION_COOKIE_NAME`: session cookie name (default `oidc.sid`)
    /// - `SESSION_IDLE_TIMEOUT_SECONDS`: idle expiry (default 1800)
    /// - `DEV_AUTH`: `"1"` or `"true"` disables secure session cookies
    /// - `BYPASS_AUTHENTICATION`: comma list of `login`, `token_set`,
    ///   `session_idle_remaining_time` or `all`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| AuthError::Config(format!("{key} is required")))
        };
        let parse_url = |key: &str, value: String| {
            value
                .parse::<Url>()
                .map_err(|e| AuthError::Config(format!("{key}: {e}")))
        };

        let application_domain = required("APPLICATION_DOMAIN")?;
        let issuer = parse_url("OIDC_ISSUER", required("OIDC_ISSUER")?)?;
        let client_id = required("OIDC_CLIENT_ID")?;
        let base_url = parse_url("OIDC_BASE_URL", required("OIDC_BASE_URL")?)?;
        let auth_path = lookup("OIDC_AUTH_PATH").unwrap_or_else(|| "/auth".into());

        let mut oidc_config = OidcConfig::new(issuer, client_id, base_url.clone())
            .with_redirect_uri(callback_uri(&base_url, &auth_path));

        if let Some(secret) = lookup("OIDC_CLIENT_SECRET") {
            oidc_config = oidc_config.with_client_secret(secret);
        }
        if let Some(value) = lookup("OIDC_REDIRECT_URI") {
            oidc_config = oidc_config.with_redirect_uri(parse_url("OIDC_REDIRECT_URI", value)?);
        }
        if let Some(value) = lookup("OIDC_POST_LOGOUT_REDIRECT_URI") {
            oidc_config = oidc_config
                .with_post_logout_redirect_uri(parse_url("OIDC_POST_LOGOUT_REDIRECT_URI", value)?);
        }
        if let Some(scopes) = lookup("OIDC_SCOPES") {
            oidc_config =
                oidc_config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1") | Some("true"));

        let bypass = match lookup("BYPASS_AUTHENTICATION") {
            Some(list) => BypassAuthentication::parse(&list)?,
            None => BypassAuthentication::none(),
        };

        let mut options = Self::new(application_domain, oidc_config)
            .with_auth_path(auth_path)
            .with_bypass_authentication(bypass)
            .with_secure_cookies(!dev_auth);

        if let Some(name) = lookup("SESSION_COOKIE_NAME") {
            options = options.with_session_cookie_name(name);
        }
        if let Some(secs) = lookup("SESSION_IDLE_TIMEOUT_SECONDS") {
            let secs = secs.parse::<i64>().ok().filter(|&s| s > 0).ok_or_else(|| {
                AuthError::Config("SESSION_IDLE_TIMEOUT_SECONDS must be a positive integer".into())
            })?;
            options = options.with_session_idle_timeout(Duration::seconds(secs));
        }

        Ok(options)
    }

    /// Set the landing-route callback used after login.
    #[must_use]
    pub fn with_landing_route<F>(mut self, landing_route: F) -> Self
    where
        F: Fn(&Parts) -> String + Send + Sync + 'static,
    {
        self.landing_route = Arc::new(landing_route);
        self
    }

    #[must_use]
    pub fn with_bypass_authentication(mut self, bypass: BypassAuthentication) -> Self {
        self.bypass = bypass;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn application_domain(&self) -> &str {
        &self.application_domain
    }

    #[must_use]
    pub fn oidc_config(&self) -> &OidcConfig {
        &self.oidc_config
    }

    #[must_use]
    pub fn bypass_authentication(&self) -> BypassAuthentication {
        self.bypass
    }

    #[must_use]
    pub fn auth_path(&self) -> &str {
        &self.auth_path
    }

    /// Landing route for the request described by `parts`.
    #[must_use]
    pub fn landing_route(&self, parts: &Parts) -> String {
        (self.landing_route)(parts)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("APPLICATION_DOMAIN", "app.example.com"),
        ("OIDC_ISSUER", "https://idp.example.com"),
        ("OIDC_CLIENT_ID", "portal"),
        ("OIDC_BASE_URL", "https://app.example.com"),
    ];

    #[test]
    fn from_env_with_required_vars() {
        let options = MiddlewareOptions::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(options.application_domain(), "app.example.com");
        assert_eq!(options.oidc_config().client_id(), "portal");
        assert_eq!(
            options.oidc_config().redirect_uri().as_str(),
            "https://app.example.com/auth/callback"
        );
        assert_eq!(options.bypass_authentication(), BypassAuthentication::none());
        assert!(options.secure_cookies);
    }

    #[test]
    fn from_env_missing_required_var() {
        let err = MiddlewareOptions::from_lookup(lookup_from(&REQUIRED[..3])).unwrap_err();
        assert!(matches!(err, AuthError::Config(msg) if msg.contains("OIDC_BASE_URL")));
    }

    #[test]
    fn from_env_rejects_invalid_url() {
        let mut vars = REQUIRED.to_vec();
        vars[1] = ("OIDC_ISSUER", "not a url");
        assert!(MiddlewareOptions::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn from_env_optional_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("OIDC_AUTH_PATH", "/oidc"),
            ("OIDC_SCOPES", "openid, groups"),
            ("SESSION_IDLE_TIMEOUT_SECONDS", "600"),
            ("DEV_AUTH", "true"),
            ("BYPASS_AUTHENTICATION", "login, session_idle_remaining_time"),
        ]);
        let options = MiddlewareOptions::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(options.auth_path(), "/oidc");
        assert_eq!(
            options.oidc_config().redirect_uri().as_str(),
            "https://app.example.com/oidc/callback"
        );
        assert_eq!(options.oidc_config().scopes(), &["openid", "groups"]);
        assert_eq!(options.session_idle_timeout, Duration::seconds(600));
        assert!(!options.secure_cookies);

        let bypass = options.bypass_authentication();
        assert!(bypass.login);
        assert!(!bypass.token_set);
        assert!(bypass.session_idle_remaining_time);
    }

    #[test]
    fn from_env_rejects_non_positive_idle_timeout() {
        for value in ["0", "-30", "soon"] {
            let mut vars = REQUIRED.to_vec();
            vars.push(("SESSION_IDLE_TIMEOUT_SECONDS", value));
            let err = MiddlewareOptions::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(
                matches!(&err, AuthError::Config(msg) if msg.contains("SESSION_IDLE_TIMEOUT_SECONDS")),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn from_env_rejects_unknown_bypass_flag() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("BYPASS_AUTHENTICATION", "logout"));
        assert!(MiddlewareOptions::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn landing_route_callback() {
        let config = OidcConfig::new(
            "https://idp.example.com".parse().unwrap(),
            "portal",
            "https://app.example.com".parse().unwrap(),
        );
        let options = MiddlewareOptions::new("app.example.com", config)
            .with_landing_route(|parts: &Parts| format!("/home{}", parts.uri.path()));

        let (parts, ()) = axum::http::Request::builder()
            .uri("/auth/login")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(options.landing_route(&parts), "/home/auth/login");
    }
}
