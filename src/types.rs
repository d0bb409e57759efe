use serde::{Deserialize, Serialize};

/// Registration metadata of the relying party, as known to the OIDC client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ClientMetadata {
    pub client_id: String,
    /// Registered callback URIs. The first entry is used for code exchange.
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,
}

impl ClientMetadata {
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uris: vec![redirect_uri.into()],
            post_logout_redirect_uris: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uris.push(uri.into());
        self
    }

    /// The callback URI registered for this client.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> Option<&str> {
        self.post_logout_redirect_uris.first().map(String::as_str)
    }
}

/// Inputs for building the provider's authorization URL.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct AuthorizationParams {
    pub state: String,
    pub scope: String,
    pub redirect_uri: Option<String>,
}

impl AuthorizationParams {
    #[must_use]
    pub fn new(state: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            scope: scope.into(),
            redirect_uri: None,
        }
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }
}

/// Parameters returned by the provider on the callback route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Values the client must check the callback against.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CallbackChecks {
    pub state: String,
}

impl CallbackChecks {
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

/// Inputs for building the provider's end-session (RP-initiated logout) URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct EndSessionParams {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
}

impl EndSessionParams {
    #[must_use]
    pub fn new(id_token_hint: Option<String>, post_logout_redirect_uri: Option<String>) -> Self {
        Self {
            id_token_hint,
            post_logout_redirect_uri,
        }
    }
}
