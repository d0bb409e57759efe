use time::{Duration, OffsetDateTime};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};

use super::config::MiddlewareOptions;
use super::error::AuthError;
use super::types::{OidcSession, SESSION_KEY};

/// Create the session manager layer the auth routes and middleware run under.
///
/// The store entry expires `session_idle_timeout` after the last write. The
/// token-set middleware writes on every authenticated request, so this
/// tracks the last activity. The cookie is scoped to the application domain.
pub fn session_layer<S: SessionStore>(options: &MiddlewareOptions, store: S) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(options.session_cookie_name.clone())
        .with_domain(options.application_domain.clone())
        .with_path("/")
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_secure(options.secure_cookies)
        .with_expiry(Expiry::OnInactivity(options.session_idle_timeout))
}

/// Whether the request's session holds a non-expired token set.
///
/// # Errors
///
/// Returns [`AuthError::Session`] if the session store fails.
pub async fn is_authenticated(session: &Session) -> Result<bool, AuthError> {
    Ok(load(session).await?.is_authenticated())
}

/// Seconds until the session idles out, floored at zero.
///
/// Counted from the last authenticated request, so polling this does not
/// keep the session alive.
///
/// # Errors
///
/// Returns [`AuthError::Session`] if the session store fails.
pub async fn session_remaining_time(
    session: &Session,
    idle_timeout: Duration,
) -> Result<i64, AuthError> {
    Ok(load(session)
        .await?
        .idle_remaining(idle_timeout, OffsetDateTime::now_utc())
        .whole_seconds())
}

pub(crate) async fn load(session: &Session) -> Result<OidcSession, AuthError> {
    Ok(session
        .get::<OidcSession>(SESSION_KEY)
        .await?
        .unwrap_or_default())
}

pub(crate) async fn store(session: &Session, record: &OidcSession) -> Result<(), AuthError> {
    session.insert(SESSION_KEY, record).await?;
    Ok(())
}
