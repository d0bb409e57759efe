use axum_extra::extract::cookie::Cookie;
use time::{Duration, OffsetDateTime};

/// Name of the upstream single-sign-on cookie cleared on logout.
pub(super) const SSO_COOKIE_NAME: &str = "SMSESSION";

/// Create removal cookie for the SSO session, scoped to the application domain.
///
/// Added to the jar unconditionally so a `Set-Cookie` is emitted even when
/// the request did not carry the cookie.
pub(super) fn clear_sso_cookie(domain: &str) -> Cookie<'static> {
    Cookie::build((SSO_COOKIE_NAME, ""))
        .domain(domain.to_string())
        .path("/")
        .secure(true)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}
