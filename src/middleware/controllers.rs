//! Framework-independent decisions of the authentication flow.
//!
//! Each controller reads and mutates an [`OidcSession`] record and returns an
//! outcome describing where the request goes next. The axum handlers in
//! `routes` load and persist the record around these calls and turn the
//! outcomes into responses.
//!
//! ```text
//! Anonymous --login--> PendingCallback --callback ok--> Authenticated
//!     ^                      |                            |      |
//!     +------ mismatch / exchange failure ----------------+      |
//!     +------ expired + refresh failure / idle / logout ---------+
//! ```

use axum::http::request::Parts;
use time::OffsetDateTime;
use url::Url;

use super::config::MiddlewareOptions;
use super::traits::OidcClient;
use super::types::{AuthContext, OidcSession};
use crate::csrf;
use crate::error::Error;
use crate::token::{Claims, TokenSet};
use crate::types::{AuthorizationParams, CallbackChecks, EndSessionParams};

/// Idle time reported while the remaining-time endpoint is bypassed.
pub const MOCKED_REMAINING_TIME: i64 = 3600;

// ── Login ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Already authenticated (or bypassed): go straight to the landing route.
    Landing(String),
    /// Send the user to the provider's authorization endpoint.
    Authorize(Url),
}

impl LoginOutcome {
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Landing(path) => path,
            Self::Authorize(url) => url.as_str(),
        }
    }
}

/// Start a login, storing a fresh anti-forgery state in the session.
///
/// # Errors
///
/// Returns the client's error if the authorization URL cannot be built.
pub fn login<C: OidcClient>(
    client: &C,
    options: &MiddlewareOptions,
    session: &mut OidcSession,
    parts: &Parts,
) -> Result<LoginOutcome, Error> {
    let active = session.is_authenticated()
        && !session.idle_expired(options.session_idle_timeout, OffsetDateTime::now_utc());
    if options.bypass.login || active {
        return Ok(LoginOutcome::Landing(options.landing_route(parts)));
    }

    let state = csrf::generate_state();
    session.oidc_state = Some(state.clone());

    let mut params = AuthorizationParams::new(state, options.oidc_config.scope());
    if let Some(uri) = client.metadata().redirect_uri() {
        params = params.with_redirect_uri(uri);
    }

    let url = client.authorization_url(&params)?;
    tracing::debug!("Redirecting to identity provider for login");
    Ok(LoginOutcome::Authorize(url))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The returned state did not match the pending login; nothing was exchanged.
    StateMismatch { redirect: String },
    /// Tokens were obtained and stored in the session.
    Authenticated { redirect: String },
    /// The provider rejected the exchange.
    ExchangeFailed { redirect: String },
}

impl CallbackOutcome {
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::StateMismatch { redirect }
            | Self::Authenticated { redirect }
            | Self::ExchangeFailed { redirect } => redirect,
        }
    }
}

/// Validate the returned state and exchange the callback for tokens.
///
/// The pending state is consumed whatever the outcome.
pub async fn callback<C: OidcClient>(
    client: &C,
    options: &MiddlewareOptions,
    session: &mut OidcSession,
    parts: &Parts,
) -> CallbackOutcome {
    let params = client.callback_params(parts);
    let base_url = options.oidc_config.base_url().to_string();

    let state = match (params.state.as_deref(), session.oidc_state.take()) {
        (Some(received), Some(expected)) if csrf::state_matches(received, &expected) => expected,
        (_, expected) => {
            tracing::warn!(
                pending_login = expected.is_some(),
                "OIDC state mismatch on callback"
            );
            return CallbackOutcome::StateMismatch { redirect: base_url };
        }
    };

    let Some(redirect_uri) = client.metadata().redirect_uri() else {
        tracing::error!("OIDC client has no registered redirect URI");
        return CallbackOutcome::ExchangeFailed { redirect: base_url };
    };

    match client
        .callback(redirect_uri, params, CallbackChecks::new(state))
        .await
    {
        Ok(token_set) => {
            let claims = token_set
                .claims()
                .inspect_err(|e| tracing::warn!(error = %e, "Token set carries no usable claims"))
                .ok();
            tracing::info!(
                sub = claims.as_ref().and_then(Claims::subject).unwrap_or("-"),
                "OIDC login successful"
            );
            session.token_set = Some(token_set);
            session.touch(OffsetDateTime::now_utc());
            CallbackOutcome::Authenticated {
                redirect: options.landing_route(parts),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "OIDC token exchange failed");
            CallbackOutcome::ExchangeFailed { redirect: base_url }
        }
    }
}

// ── Token set ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum TokenSetOutcome {
    /// Authentication is bypassed for protected routes.
    Bypassed,
    /// No token set in the session.
    Anonymous,
    /// The stored token set is still valid.
    Current(AuthContext),
    /// The token set had expired and was replaced.
    Refreshed(AuthContext),
    /// The token set had expired and could not be refreshed; it was dropped.
    RefreshFailed,
    /// No authenticated activity within the idle timeout; the token set was dropped.
    IdleExpired,
}

impl TokenSetOutcome {
    /// Context to attach to the request.
    #[must_use]
    pub fn context(&self) -> AuthContext {
        match self {
            Self::Current(context) | Self::Refreshed(context) => context.clone(),
            Self::Bypassed | Self::Anonymous | Self::RefreshFailed | Self::IdleExpired => {
                AuthContext::anonymous()
            }
        }
    }

    /// Whether the session record was modified.
    ///
    /// Every authenticated pass records activity, so only anonymous and
    /// bypassed requests leave the record untouched.
    #[must_use]
    pub fn session_changed(&self) -> bool {
        !matches!(self, Self::Bypassed | Self::Anonymous)
    }
}

/// Refresh an expired token set, otherwise derive claims from the current one.
///
/// Authenticated passes record activity, keeping the session alive. Idle
/// sessions and refresh failures are not fatal: the session loses its token
/// set and the request continues anonymously.
pub async fn token_set<C: OidcClient>(
    client: &C,
    options: &MiddlewareOptions,
    session: &mut OidcSession,
) -> TokenSetOutcome {
    if options.bypass.token_set {
        return TokenSetOutcome::Bypassed;
    }

    if session.token_set.is_none() {
        return TokenSetOutcome::Anonymous;
    }

    let now = OffsetDateTime::now_utc();
    if session.idle_expired(options.session_idle_timeout, now) {
        tracing::info!("Session idle timeout reached, dropping token set");
        session.sign_out();
        return TokenSetOutcome::IdleExpired;
    }

    let Some(current) = session.token_set.as_ref() else {
        return TokenSetOutcome::Anonymous;
    };

    if !current.expired() {
        let context = context_from(current);
        session.touch(now);
        return TokenSetOutcome::Current(context);
    }

    match client.refresh(current).await {
        Ok(refreshed) => {
            tracing::debug!("Refreshed expired token set");
            let context = context_from(&refreshed);
            session.token_set = Some(refreshed);
            session.touch(now);
            TokenSetOutcome::Refreshed(context)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token refresh failed, dropping token set");
            session.sign_out();
            TokenSetOutcome::RefreshFailed
        }
    }
}

fn context_from(token_set: &TokenSet) -> AuthContext {
    match token_set.claims() {
        Ok(claims) => AuthContext::authenticated(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Token set carries no usable claims");
            AuthContext::anonymous()
        }
    }
}

// ── Logout ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub redirect: String,
    /// The session held tokens and must be destroyed.
    pub destroy_session: bool,
}

/// Decide where logout goes: the provider's end-session URL when the
/// session held tokens, the application base URL otherwise.
pub fn logout<C: OidcClient>(
    client: &C,
    options: &MiddlewareOptions,
    session: &OidcSession,
) -> LogoutOutcome {
    let base_url = options.oidc_config.base_url().to_string();

    let Some(token_set) = &session.token_set else {
        return LogoutOutcome {
            redirect: base_url,
            destroy_session: false,
        };
    };

    let params = EndSessionParams::new(
        token_set.id_token.clone(),
        client
            .metadata()
            .post_logout_redirect_uri()
            .map(str::to_owned),
    );

    let redirect = match client.end_session_url(&params) {
        Ok(url) => url.into(),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot build end-session URL, using base URL");
            base_url
        }
    };

    LogoutOutcome {
        redirect,
        destroy_session: true,
    }
}

// ── Session idle remaining time ────────────────────────────────────

/// Seconds until the session idles out, or [`MOCKED_REMAINING_TIME`] when
/// bypassed. Reading it does not count as activity.
#[must_use]
pub fn session_idle_remaining_time(options: &MiddlewareOptions, session: &OidcSession) -> i64 {
    if options.bypass.session_idle_remaining_time {
        return MOCKED_REMAINING_TIME;
    }
    session
        .idle_remaining(options.session_idle_timeout, OffsetDateTime::now_utc())
        .whole_seconds()
}
