use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::token::{Claims, TokenSet};

/// Session key under which [`OidcSession`] is stored.
pub(crate) const SESSION_KEY: &str = "oidc";

/// Authentication state kept in the server-side session.
///
/// Created empty on first use, mutated by every controller and destroyed on
/// logout or session expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcSession {
    /// Anti-forgery state of the pending login, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_state: Option<String>,
    /// Token set of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_set: Option<TokenSet>,
    /// Last authenticated request, in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
}

impl OidcSession {
    /// Whether this session holds a non-expired token set.
    ///
    /// This is the single gate for all protected behavior.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token_set.as_ref().is_some_and(|set| !set.expired())
    }

    /// Record authenticated activity at `now`.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_activity = Some(unix_millis(now));
    }

    /// Time left before the session idles out, floored at zero.
    ///
    /// Zero when no authenticated activity was ever recorded.
    #[must_use]
    pub fn idle_remaining(&self, idle_timeout: Duration, now: OffsetDateTime) -> Duration {
        let Some(last) = self.last_activity else {
            return Duration::ZERO;
        };
        let idle = Duration::milliseconds(unix_millis(now).saturating_sub(last));
        (idle_timeout - idle).max(Duration::ZERO)
    }

    /// Whether recorded activity is older than `idle_timeout`.
    ///
    /// Sessions without recorded activity never idle out here.
    #[must_use]
    pub fn idle_expired(&self, idle_timeout: Duration, now: OffsetDateTime) -> bool {
        self.last_activity.is_some() && self.idle_remaining(idle_timeout, now).is_zero()
    }

    /// Forget the token set and its activity timestamp.
    pub(crate) fn sign_out(&mut self) {
        self.token_set = None;
        self.last_activity = None;
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Per-request authentication context attached by the token-set middleware.
///
/// Anonymous requests carry `claims: None`.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub claims: Option<Claims>,
}

impl AuthContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_schema_keys() {
        let mut session = OidcSession {
            oidc_state: Some("abc".into()),
            token_set: Some(TokenSet::new("at")),
            last_activity: None,
        };
        session.touch(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap());
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["oidcState"], "abc");
        assert_eq!(json["tokenSet"]["access_token"], "at");
        assert_eq!(json["lastActivity"], 1_700_000_000_000_i64);
    }

    #[test]
    fn empty_session_is_anonymous() {
        assert!(!OidcSession::default().is_authenticated());
    }

    #[test]
    fn expired_token_set_is_not_authenticated() {
        let session = OidcSession {
            oidc_state: None,
            token_set: Some(TokenSet::new("at").with_expires_at(0)),
            last_activity: None,
        };
        assert!(!session.is_authenticated());

        let session = OidcSession {
            oidc_state: None,
            token_set: Some(TokenSet::new("at").with_expires_at(i64::MAX)),
            last_activity: None,
        };
        assert!(session.is_authenticated());
    }

    #[test]
    fn idle_remaining_counts_down_from_last_activity() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let timeout = Duration::seconds(10);
        let mut session = OidcSession::default();

        assert_eq!(session.idle_remaining(timeout, start), Duration::ZERO);
        assert!(!session.idle_expired(timeout, start));

        session.touch(start);
        assert_eq!(session.idle_remaining(timeout, start), timeout);
        assert_eq!(
            session.idle_remaining(timeout, start + Duration::seconds(4)),
            Duration::seconds(6)
        );
        assert!(!session.idle_expired(timeout, start + Duration::seconds(4)));

        assert_eq!(
            session.idle_remaining(timeout, start + Duration::seconds(30)),
            Duration::ZERO
        );
        assert!(session.idle_expired(timeout, start + Duration::seconds(10)));
    }

    #[test]
    fn touch_extends_idle_window() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let timeout = Duration::seconds(3);
        let mut session = OidcSession::default();

        session.touch(start);
        session.touch(start + Duration::seconds(2));

        let later = start + Duration::seconds(4);
        assert!(!session.idle_expired(timeout, later));
        assert_eq!(session.idle_remaining(timeout, later), Duration::seconds(1));
    }
}
