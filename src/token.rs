use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;

use crate::error::Error;

/// Raw token endpoint response (authorization code or refresh grant).
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token bundle issued by the identity provider.
///
/// Owned by the session and replaced wholesale on refresh. Expiry is kept as
/// an absolute unix timestamp so the set survives serialization into the
/// session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenSet {
    /// Create a token set holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            refresh_token: None,
            id_token: None,
            scope: None,
            expires_at: None,
        }
    }

    /// Build a token set from a token endpoint response received at `now`.
    #[must_use]
    pub fn from_response(response: TokenResponse, now: OffsetDateTime) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            scope: response.scope,
            expires_at: response
                .expires_in
                .map(|secs| now.unix_timestamp().saturating_add(secs)),
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, unix_seconds: i64) -> Self {
        self.expires_at = Some(unix_seconds);
        self
    }

    /// Seconds until the access token expires, floored at zero.
    ///
    /// `None` when the provider did not report a lifetime.
    #[must_use]
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in_at(OffsetDateTime::now_utc())
    }

    fn expires_in_at(&self, now: OffsetDateTime) -> Option<i64> {
        self.expires_at
            .map(|at| at.saturating_sub(now.unix_timestamp()).max(0))
    }

    /// Whether the access token has expired.
    ///
    /// A set without a reported lifetime never expires on its own.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_in_at(now) == Some(0)
    }

    /// Identity claims carried in the ID token payload.
    ///
    /// The payload is decoded without signature verification; the issuing
    /// client is responsible for validating the ID token before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the set has no ID token or its payload is
    /// not a base64url-encoded JSON object.
    pub fn claims(&self) -> Result<Claims, Error> {
        let id_token = self
            .id_token
            .as_deref()
            .ok_or_else(|| Error::Token("id_token not present in token set".into()))?;
        decode_payload(id_token)
    }
}

/// User identity attributes decoded from an ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    inner: Map<String, JsonValue>,
}

impl Claims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// The `sub` claim, if present and a string.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.inner.get("sub").and_then(JsonValue::as_str)
    }

    #[must_use]
    pub fn as_json(&self) -> &Map<String, JsonValue> {
        &self.inner
    }
}

impl From<Map<String, JsonValue>> for Claims {
    fn from(inner: Map<String, JsonValue>) -> Self {
        Self { inner }
    }
}

/// Decodes the payload segment of a compact JWS.
fn decode_payload(token: &str) -> Result<Claims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid id_token format".into()));
    }

    // Some providers pad their segments despite RFC 7515.
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| Error::Token("invalid id_token payload encoding".into()))?;

    match serde_json::from_slice::<JsonValue>(&payload) {
        Ok(JsonValue::Object(map)) => Ok(Claims::from(map)),
        Ok(_) => Err(Error::Token("id_token payload is not a JSON object".into())),
        Err(e) => Err(Error::Token(format!("invalid id_token payload: {e}"))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unsigned compact JWS with the given payload, good enough for claim decoding.
    pub(crate) fn fake_id_token(payload: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    #[test]
    fn test_from_response_computes_absolute_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","token_type":"Bearer","expires_in":300,"refresh_token":"rt"}"#,
        )
        .unwrap();
        let set = TokenSet::from_response(response, at(1_000));

        assert_eq!(set.access_token, "at");
        assert_eq!(set.refresh_token.as_deref(), Some("rt"));
        assert_eq!(set.expires_at, Some(1_300));
    }

    #[test]
    fn test_expired_boundaries() {
        let set = TokenSet::new("at").with_expires_at(1_000);

        assert!(!set.expired_at(at(999)));
        assert!(set.expired_at(at(1_000)));
        assert!(set.expired_at(at(5_000)));
    }

    #[test]
    fn test_without_lifetime_never_expires() {
        let set = TokenSet::new("at");
        assert!(!set.expired());
        assert_eq!(set.expires_in(), None);
    }

    #[test]
    fn test_claims_decoded_from_id_token() {
        let token = fake_id_token(&serde_json::json!({"sub": "user-1", "email": "a@b.c"}));
        let claims = TokenSet::new("at").with_id_token(token).claims().unwrap();

        assert_eq!(claims.subject(), Some("user-1"));
        assert_eq!(claims.get_claim("email"), Some(&serde_json::json!("a@b.c")));
    }

    #[test]
    fn test_claims_require_id_token() {
        assert!(matches!(TokenSet::new("at").claims(), Err(Error::Token(_))));
    }

    #[test]
    fn test_claims_reject_malformed_token() {
        let set = TokenSet::new("at").with_id_token("not-a-jwt");
        assert!(set.claims().is_err());

        let array_payload = fake_id_token(&serde_json::json!(["sub"]));
        let set = TokenSet::new("at").with_id_token(array_payload);
        assert!(set.claims().is_err());
    }

    #[test]
    fn test_token_set_session_shape() {
        let set = TokenSet::new("at").with_expires_at(42);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!({"access_token": "at", "expires_at": 42}));
    }
}
