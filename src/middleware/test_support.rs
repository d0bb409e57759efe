//! Test doubles shared by the controller and router tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::request::Parts;
use url::Url;

use super::config::MiddlewareOptions;
use super::traits::OidcClient;
use crate::error::Error;
use crate::provider::OidcConfig;
use crate::token::TokenSet;
use crate::token::tests::fake_id_token;
use crate::types::{
    AuthorizationParams, CallbackChecks, CallbackParams, ClientMetadata, EndSessionParams,
};

const FAR_FUTURE: i64 = 4_102_444_800; // 2100-01-01

pub(crate) fn test_options() -> MiddlewareOptions {
    let config = OidcConfig::new(
        "https://idp.example.com".parse().unwrap(),
        "portal",
        "https://app.example.com".parse().unwrap(),
    );
    MiddlewareOptions::new("app.example.com", config).with_landing_route(|_: &Parts| "/dashboard".into())
}

pub(crate) fn parts(uri: &str) -> Parts {
    let (parts, ()) = axum::http::Request::builder()
        .uri(uri)
        .body(())
        .unwrap()
        .into_parts();
    parts
}

pub(crate) fn authenticated_set() -> TokenSet {
    TokenSet::new("access-1")
        .with_refresh_token("refresh-1")
        .with_id_token(fake_id_token(&serde_json::json!({"sub": "user-1"})))
        .with_expires_at(FAR_FUTURE)
}

pub(crate) fn expired_set() -> TokenSet {
    TokenSet::new("access-0")
        .with_refresh_token("refresh-0")
        .with_id_token(fake_id_token(&serde_json::json!({"sub": "user-1"})))
        .with_expires_at(1)
}

/// Scripted [`OidcClient`] that records how it was called.
pub(crate) struct MockClient {
    metadata: ClientMetadata,
    exchange_result: Option<TokenSet>,
    refresh_result: Option<TokenSet>,
    end_session: bool,
    pub(crate) exchange_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    last_callback: Mutex<Option<(String, CallbackChecks)>>,
    last_refreshed: Mutex<Option<TokenSet>>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self {
            metadata: test_options().oidc_config().client_metadata(),
            exchange_result: Some(authenticated_set()),
            refresh_result: Some(Self::refreshed_set()),
            end_session: true,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            last_callback: Mutex::new(None),
            last_refreshed: Mutex::new(None),
        }
    }

    pub(crate) fn refreshed_set() -> TokenSet {
        TokenSet::new("access-2")
            .with_refresh_token("refresh-2")
            .with_id_token(fake_id_token(&serde_json::json!({"sub": "user-1", "v": 2})))
            .with_expires_at(FAR_FUTURE)
    }

    pub(crate) fn exchanging(mut self, token_set: TokenSet) -> Self {
        self.exchange_result = Some(token_set);
        self
    }

    pub(crate) fn failing_exchange(mut self) -> Self {
        self.exchange_result = None;
        self
    }

    pub(crate) fn failing_refresh(mut self) -> Self {
        self.refresh_result = None;
        self
    }

    pub(crate) fn without_end_session(mut self) -> Self {
        self.end_session = false;
        self
    }

    pub(crate) fn last_callback(&self) -> Option<(String, CallbackChecks)> {
        self.last_callback.lock().unwrap().clone()
    }

    pub(crate) fn last_refreshed(&self) -> Option<TokenSet> {
        self.last_refreshed.lock().unwrap().clone()
    }

    fn rejected(operation: &'static str) -> Error {
        Error::OAuth {
            operation,
            status: Some(400),
            detail: "invalid_grant".into(),
        }
    }
}

impl OidcClient for MockClient {
    fn metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, Error> {
        let mut url: Url = "https://idp.example.com/authorize".parse()?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.metadata.client_id)
            .append_pair("scope", &params.scope)
            .append_pair("state", &params.state);
        Ok(url)
    }

    async fn callback(
        &self,
        redirect_uri: &str,
        _params: CallbackParams,
        checks: CallbackChecks,
    ) -> Result<TokenSet, Error> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_callback.lock().unwrap() = Some((redirect_uri.to_string(), checks));
        self.exchange_result
            .clone()
            .ok_or_else(|| Self::rejected("token exchange"))
    }

    async fn refresh(&self, token_set: &TokenSet) -> Result<TokenSet, Error> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refreshed.lock().unwrap() = Some(token_set.clone());
        self.refresh_result
            .clone()
            .ok_or_else(|| Self::rejected("token refresh"))
    }

    fn end_session_url(&self, params: &EndSessionParams) -> Result<Url, Error> {
        if !self.end_session {
            return Err(Error::Discovery("no end_session_endpoint".into()));
        }
        let mut url: Url = "https://idp.example.com/logout".parse()?;
        {
            let mut query = url.query_pairs_mut();
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
